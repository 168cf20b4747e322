//! A minimal daemon that accepts TCP connections and drives the session
//! engine with a trivial acceptance policy (accept everyone, print the
//! message to stdout). Everything the library deliberately leaves to its
//! caller — the network accept loop, configuration loading, and the
//! acceptance policy itself — lives here instead.
//!
//! STARTTLS is wired in by default, using `SMTPD_DEMO_CERT`/`SMTPD_DEMO_KEY`
//! PEM files when set, or an `rcgen`-generated self-signed development
//! certificate otherwise, so a client connecting to the demo can actually
//! exercise the upgrade path rather than only ever speaking plaintext.

use std::sync::Arc;

use anyhow::Result;
use log::{error, info};
use smtp_session_core::{Event, RustlsTlsProvider, Session, SessionLimits};
use tokio::net::{TcpListener, TcpStream};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));
    let _ = dotenv::dotenv();

    let bind_address = std::env::var("SMTPD_DEMO_BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("SMTPD_DEMO_PORT")
        .unwrap_or_else(|_| "2525".to_string())
        .parse()?;

    let tls_provider = dev_tls_provider()?;

    let addr = format!("{bind_address}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("smtpd_demo listening on {addr} (STARTTLS available)");

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("connection from {peer}");
        let tls_provider = tls_provider.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, tls_provider).await {
                error!("connection from {peer} ended with an error: {e:#}");
            }
        });
    }
}

/// Drives one connection to completion, accepting every envelope command
/// and printing the resulting message. A real daemon would check senders,
/// recipients, and message content here instead.
async fn handle_connection(stream: TcpStream, tls_provider: Arc<RustlsTlsProvider>) -> Result<()> {
    let mut session = Session::new(stream, SessionLimits::default()).with_tls_provider(tls_provider);

    loop {
        match session.next_event().await? {
            Event::Command { cmd, arg } => {
                info!("command: {cmd:?} {arg:?}");
                session.accept().await?;
            }
            Event::GotData { body } => {
                info!("message body ({} bytes):\n{}", body.len(), String::from_utf8_lossy(&body));
                session.accept_data("demo-1").await?;
            }
            Event::Done => {
                info!("session ended gracefully");
                return Ok(());
            }
            Event::Abort | Event::TlsError => {
                info!("session aborted");
                return Ok(());
            }
        }
    }
}

/// Builds a TLS provider for STARTTLS, either from `SMTPD_DEMO_CERT`/
/// `SMTPD_DEMO_KEY` PEM files if set, or from an `rcgen`-generated
/// self-signed development certificate.
fn dev_tls_provider() -> Result<Arc<RustlsTlsProvider>> {
    let config = match (std::env::var("SMTPD_DEMO_CERT"), std::env::var("SMTPD_DEMO_KEY")) {
        (Ok(cert_path), Ok(key_path)) => {
            let mut cert_reader = std::io::BufReader::new(std::fs::File::open(cert_path)?);
            let mut key_reader = std::io::BufReader::new(std::fs::File::open(key_path)?);
            smtp_session_core::tls::server_config_from_pem(&mut cert_reader, &mut key_reader)?
        }
        _ => {
            let rcgen::CertifiedKey { cert, signing_key } =
                rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
            let cert_der = cert.der().clone();
            let key_der = rustls_pki_types::PrivateKeyDer::try_from(signing_key.serialize_der())
                .map_err(|e| anyhow::anyhow!("invalid generated key: {e}"))?;
            rustls::ServerConfig::builder()
                .with_no_client_auth()
                .with_single_cert(vec![cert_der], key_der)?
        }
    };

    Ok(Arc::new(RustlsTlsProvider::new(Arc::new(config))))
}

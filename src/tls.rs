//! The TLS provider external collaborator and the connection wrapper that
//! lets STARTTLS replace the session's byte stream in place.
//!
//! Built on `rustls` + `tokio-rustls` for inbound TLS acceptance.

use std::io;
use std::io::BufRead;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::error::{SessionError, SessionResult};

/// Builds a `rustls::ServerConfig` from a PEM-encoded certificate chain and
/// private key, for callers loading TLS material from files rather than
/// generating it on the fly.
pub fn server_config_from_pem(
    cert_chain_pem: &mut dyn BufRead,
    private_key_pem: &mut dyn BufRead,
) -> io::Result<rustls::ServerConfig> {
    let certs = rustls_pemfile::certs(cert_chain_pem).collect::<Result<Vec<_>, _>>()?;
    let key = rustls_pemfile::private_key(private_key_pem)?
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "no private key found in PEM input"))?;

    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Given the current byte stream and a server TLS configuration, performs a
/// TLS handshake and returns a new byte stream framed over it.
#[async_trait]
pub trait TlsProvider<S>: Send + Sync
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn handshake(&self, stream: S) -> SessionResult<TlsStream<S>>;

    /// The negotiated cipher suite's name, once a handshake has completed.
    /// Used only for diagnostics; the session never branches on it.
    fn cipher_name(&self, tls: &TlsStream<S>) -> Option<String> {
        let (_, session) = tls.get_ref();
        session
            .negotiated_cipher_suite()
            .map(|suite| format!("{:?}", suite.suite()))
    }
}

/// The default `TlsProvider`, backed by a `rustls::ServerConfig`.
pub struct RustlsTlsProvider {
    acceptor: TlsAcceptor,
}

impl RustlsTlsProvider {
    pub fn new(config: Arc<rustls::ServerConfig>) -> Self {
        RustlsTlsProvider {
            acceptor: TlsAcceptor::from(config),
        }
    }
}

#[async_trait]
impl<S> TlsProvider<S> for RustlsTlsProvider
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn handshake(&self, stream: S) -> SessionResult<TlsStream<S>> {
        self.acceptor
            .accept(stream)
            .await
            .map_err(SessionError::TlsHandshake)
    }
}

/// The session's byte stream, which is either the raw connection or the
/// TLS-framed stream installed after a successful STARTTLS handshake.
///
/// On upgrade, the chain is rebuilt atomically around the new variant; any
/// buffered reader/writer state from before the handshake is discarded, as
/// required by the concurrency model (STARTTLS must not leak plaintext
/// buffered ahead of the handshake into the encrypted session).
pub enum Conn<S> {
    Plain(S),
    Tls(Box<TlsStream<S>>),
}

impl<S> Conn<S> {
    pub fn is_tls(&self) -> bool {
        matches!(self, Conn::Tls(_))
    }
}

impl<S> AsyncRead for Conn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Conn::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl<S> AsyncWrite for Conn<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Conn::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Conn::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => Pin::new(s).poll_flush(cx),
            Conn::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Conn::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

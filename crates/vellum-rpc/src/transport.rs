//! TCP and TLS transport for the gRPC client.
//!
//! Resolves a `host:port` target, connects the first address that accepts,
//! and optionally wraps the socket in TLS with SNI and ALPN pinned to `h2`.
//! A connection that completes the handshake without negotiating `h2`
//! cannot carry gRPC and is rejected immediately.
//!
//! # Security
//!
//! TLS uses the system trust anchors with peer verification enforced;
//! there is no insecure mode. The rustls provider is installed once per
//! process, idempotently, on the first TLS call.

use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::{Arc, Once},
    task::{Context, Poll},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::{TcpStream, lookup_host},
    time::timeout,
};
use tokio_rustls::client::TlsStream;

use crate::error::RpcError;

/// ALPN protocol id for HTTP/2 over TLS.
const ALPN_H2: &[u8] = b"h2";

/// Bound on each transport-phase socket operation: one TCP connect attempt
/// or the TLS handshake. A peer that accepts the connection and then goes
/// silent fails fast instead of pinning the call.
const IO_TIMEOUT: Duration = Duration::from_secs(1);

/// Process-wide rustls provider installation.
static TLS_PROVIDER_INIT: Once = Once::new();

/// Install the ring crypto provider exactly once.
///
/// Safe under concurrent first use. If the embedding application installed
/// a provider first, that installation wins and this becomes a no-op.
pub(crate) fn init_tls_provider() {
    TLS_PROVIDER_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A connected stream, plain or TLS, behind one I/O type for the HTTP/2
/// session.
pub(crate) enum MaybeTlsStream {
    /// Cleartext TCP.
    Plain(TcpStream),
    /// TLS over TCP with `h2` negotiated.
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for MaybeTlsStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MaybeTlsStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Connect to `target`, wrapping in TLS when requested.
pub(crate) async fn connect(target: &str, use_tls: bool) -> Result<MaybeTlsStream, RpcError> {
    let (host, port) = parse_target(target, use_tls)?;
    let tcp = connect_tcp(&host, port).await?;

    if use_tls {
        let tls = tls_connect(tcp, &host).await?;
        Ok(MaybeTlsStream::Tls(Box::new(tls)))
    } else {
        Ok(MaybeTlsStream::Plain(tcp))
    }
}

/// Split a target into host and port.
///
/// The rightmost `:` separates the port; a missing port defaults to 443
/// (TLS) or 80 (cleartext). Bracketed IPv6 literals (`[::1]:7447`) are
/// accepted and the brackets stripped from the host.
pub(crate) fn parse_target(target: &str, use_tls: bool) -> Result<(String, u16), RpcError> {
    let default_port = if use_tls { 443 } else { 80 };

    if target.is_empty() {
        return Err(RpcError::InvalidArgument("empty target".to_string()));
    }

    if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| RpcError::InvalidArgument(format!("unclosed bracket in {target:?}")))?;
        if host.is_empty() {
            return Err(RpcError::InvalidArgument(format!("empty host in {target:?}")));
        }
        return match after {
            "" => Ok((host.to_string(), default_port)),
            _ => {
                let port = after
                    .strip_prefix(':')
                    .and_then(|p| p.parse::<u16>().ok())
                    .ok_or_else(|| {
                        RpcError::InvalidArgument(format!("bad port in {target:?}"))
                    })?;
                Ok((host.to_string(), port))
            },
        };
    }

    match target.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() {
                return Err(RpcError::InvalidArgument(format!("empty host in {target:?}")));
            }
            let port = port
                .parse::<u16>()
                .map_err(|_| RpcError::InvalidArgument(format!("bad port in {target:?}")))?;
            Ok((host.to_string(), port))
        },
        None => Ok((target.to_string(), default_port)),
    }
}

/// Resolve and connect; the first address that accepts within the socket
/// timeout wins. An attempt that stalls counts as a failed address.
async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, RpcError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| RpcError::ConnectFailed(format!("resolving {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(RpcError::ConnectFailed(format!("no addresses for {host}")));
    }

    let mut last_error = None;
    for addr in addrs {
        match timeout(IO_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                // Nagle off: unary calls are latency-bound single writes.
                stream
                    .set_nodelay(true)
                    .map_err(|e| RpcError::ConnectFailed(e.to_string()))?;
                tracing::debug!("connected to {addr}");
                return Ok(stream);
            },
            Ok(Err(e)) => {
                tracing::debug!("connect to {addr} failed: {e}");
                last_error = Some(e.to_string());
            },
            Err(_) => {
                tracing::debug!("connect to {addr} timed out");
                last_error = Some(format!("connect to {addr} timed out"));
            },
        }
    }

    Err(RpcError::ConnectFailed(
        last_error.unwrap_or_else(|| "connect failed".to_string()),
    ))
}

/// Perform the TLS handshake with SNI and ALPN `h2`.
///
/// The handshake is bounded by the socket timeout; a peer that accepts
/// the connection but stalls mid-handshake surfaces as
/// [`RpcError::Timeout`] rather than hanging until the hard deadline.
async fn tls_connect(tcp: TcpStream, host: &str) -> Result<TlsStream<TcpStream>, RpcError> {
    init_tls_provider();

    let native = rustls_native_certs::load_native_certs();
    if !native.errors.is_empty() {
        tracing::warn!("some system trust anchors failed to load: {:?}", native.errors);
    }

    let mut roots = rustls::RootCertStore::empty();
    let (_added, _ignored) = roots.add_parsable_certificates(native.certs);
    if roots.is_empty() {
        return Err(RpcError::Tls("no usable system trust anchors".to_string()));
    }

    let mut config =
        rustls::ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
    config.alpn_protocols = vec![ALPN_H2.to_vec()];

    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|e| RpcError::Tls(format!("invalid server name {host:?}: {e}")))?;

    let connector = tokio_rustls::TlsConnector::from(Arc::new(config));
    let stream = match timeout(IO_TIMEOUT, connector.connect(server_name, tcp)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(RpcError::Tls(e.to_string())),
        Err(_) => return Err(RpcError::Timeout),
    };

    if stream.get_ref().1.alpn_protocol() != Some(ALPN_H2) {
        return Err(RpcError::AlpnMismatch);
    }

    tracing::debug!("TLS established with {host}, ALPN h2");
    Ok(stream)
}

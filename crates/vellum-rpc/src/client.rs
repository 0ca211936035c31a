//! Unary-call orchestrator.
//!
//! Composes the layers for one call: parse and connect the target, bring
//! up the HTTP/2 session, frame and send the request, collect the response
//! and its gRPC status, then tear everything down. No socket, TLS state,
//! HTTP/2 session, or buffer outlives the call on any path.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::time::timeout;

use crate::{error::RpcError, framing, session, transport};

/// Deadlines for one unary call.
///
/// The defaults match the protocol design: a stalled response with bytes
/// already buffered is accepted after the soft deadline, and the call
/// fails outright at the hard deadline.
#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
    /// Accept a partially buffered response after this long without
    /// progress.
    pub soft_deadline: Duration,

    /// Fail with [`RpcError::Timeout`] after this long.
    pub hard_deadline: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            soft_deadline: Duration::from_secs(3),
            hard_deadline: Duration::from_secs(10),
        }
    }
}

/// Perform a unary gRPC call with default deadlines.
///
/// - `target`: `host:port` (rightmost colon splits; port defaults to 443
///   with TLS, 80 without; bracketed IPv6 literals accepted)
/// - `authority`: value for the `:authority` pseudo-header
/// - `method`: full method URI, e.g. `/vellum.Sync/Push`
/// - `request`: encoded request message (without gRPC framing)
/// - `auth_token`: sent as `authorization: Bearer <token>` when non-empty
/// - `use_tls`: TLS with ALPN `h2` and system trust anchors, or cleartext
///
/// Returns the decoded response message on `grpc-status` 0 (or when the
/// peer closed cleanly without a status, in which case an empty response
/// is possible). The hard deadline bounds the entire call, connect and
/// TLS included; individual socket operations are additionally bounded by
/// the transport's one-second timeout.
///
/// # Errors
///
/// See [`RpcError`]; a non-zero peer status surfaces as
/// [`RpcError::GrpcStatus`] whose message prefers the peer's
/// `grpc-message`.
pub async fn unary_call(
    target: &str,
    authority: &str,
    method: &str,
    request: &[u8],
    auth_token: Option<&str>,
    use_tls: bool,
) -> Result<Bytes, RpcError> {
    unary_call_with_options(
        target,
        authority,
        method,
        request,
        auth_token,
        use_tls,
        CallOptions::default(),
    )
    .await
}

/// [`unary_call`] with explicit deadlines.
pub async fn unary_call_with_options(
    target: &str,
    authority: &str,
    method: &str,
    request: &[u8],
    auth_token: Option<&str>,
    use_tls: bool,
    options: CallOptions,
) -> Result<Bytes, RpcError> {
    if authority.is_empty() {
        return Err(RpcError::InvalidArgument("empty authority".to_string()));
    }

    let head = framing::build_request(use_tls, authority, method, auth_token)?;
    let request_body = framing::encode_frame(request)?;

    tracing::debug!("unary call {method} -> {target} (tls: {use_tls})");

    // One clock for the whole call: the hard deadline covers resolution,
    // connect, and TLS as well as the HTTP/2 exchange. The transport also
    // bounds each socket operation on its own, so a silent peer fails
    // long before this outer limit.
    let started = Instant::now();
    let io = match timeout(options.hard_deadline, transport::connect(target, use_tls)).await {
        Ok(io) => io?,
        Err(_) => return Err(RpcError::Timeout),
    };
    let response = session::run_unary(io, head, request_body, &options, started).await?;

    match response.grpc_status {
        // Status 0 is success; an unseen status means the peer completed
        // the exchange without trailers, also treated as success.
        Some(0) | None => {
            if response.body.is_empty() {
                Ok(Bytes::new())
            } else {
                framing::decode_frame(&response.body)
            }
        },
        Some(code) => {
            tracing::debug!("unary call {method} failed with grpc-status {code}");
            Err(RpcError::GrpcStatus { code, message: response.grpc_message })
        },
    }
}

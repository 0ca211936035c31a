//! gRPC wire framing.
//!
//! A gRPC message travels inside HTTP/2 DATA frames with a 5-byte prefix:
//!
//! ```text
//! [compression flag: 1 byte] [message length: u32 big-endian] [message]
//! ```
//!
//! This client never compresses, so the flag is always zero. The response
//! status does not live in the frame at all: it arrives as the
//! `grpc-status` (and optional `grpc-message`) header in the response
//! HEADERS or trailer block.

use bytes::{BufMut, Bytes, BytesMut};
use http::{HeaderMap, Request, header};

use crate::error::RpcError;

/// Frame prefix size: flag byte plus big-endian length.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Wrap a message in the gRPC length-prefixed frame.
///
/// # Errors
///
/// `InvalidArgument` when the message does not fit the u32 length field.
pub fn encode_frame(message: &[u8]) -> Result<Bytes, RpcError> {
    let len = u32::try_from(message.len())
        .map_err(|_| RpcError::InvalidArgument("request exceeds 4 GiB frame limit".to_string()))?;

    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + message.len());
    buf.put_u8(0); // no compression
    buf.put_u32(len);
    buf.put_slice(message);
    Ok(buf.freeze())
}

/// Extract the message from a buffered gRPC frame.
///
/// Bytes past the declared frame are ignored; they belong to a stream this
/// unary client never reads.
///
/// # Errors
///
/// `Truncated` when the buffer ends before the declared frame does.
pub fn decode_frame(buf: &[u8]) -> Result<Bytes, RpcError> {
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(RpcError::Truncated { expected: FRAME_HEADER_SIZE, actual: buf.len() });
    }

    let declared = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
    let total = FRAME_HEADER_SIZE + declared;
    if buf.len() < total {
        return Err(RpcError::Truncated { expected: total, actual: buf.len() });
    }

    Ok(Bytes::copy_from_slice(&buf[FRAME_HEADER_SIZE..total]))
}

/// Build the HTTP/2 request head for a unary call.
///
/// Pseudo-headers and headers in the order gRPC requires: `:method POST`,
/// `:scheme`, `:path` (the full method URI), `:authority`, then
/// `content-type: application/grpc`, `te: trailers`, and a bearer
/// `authorization` header when a non-empty token is supplied. No
/// `content-length`; the body is delimited by DATA + END_STREAM.
///
/// # Errors
///
/// `InvalidArgument` when the method path or authority cannot form a valid
/// request URI.
pub fn build_request(
    use_tls: bool,
    authority: &str,
    method: &str,
    auth_token: Option<&str>,
) -> Result<Request<()>, RpcError> {
    if !method.starts_with('/') {
        return Err(RpcError::InvalidArgument(format!(
            "method must be a /package.Service/Method path, got {method:?}"
        )));
    }

    let uri = http::Uri::builder()
        .scheme(if use_tls { "https" } else { "http" })
        .authority(authority)
        .path_and_query(method)
        .build()
        .map_err(|e| RpcError::InvalidArgument(format!("bad request URI: {e}")))?;

    let mut builder = Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/grpc")
        .header(header::TE, "trailers");

    if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
        let value = http::HeaderValue::try_from(format!("Bearer {token}"))
            .map_err(|e| RpcError::InvalidArgument(format!("bad auth token: {e}")))?;
        builder = builder.header(header::AUTHORIZATION, value);
    }

    builder
        .body(())
        .map_err(|e| RpcError::InvalidArgument(format!("bad request head: {e}")))
}

/// Pull `grpc-status` / `grpc-message` out of a header or trailer block.
///
/// Returns `(status, message)`; a missing or unparseable `grpc-status`
/// yields `None` so the session can keep waiting for the real trailer.
pub(crate) fn grpc_status_from_headers(headers: &HeaderMap) -> (Option<i32>, Option<String>) {
    let status = headers
        .get("grpc-status")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i32>().ok());

    let message = headers
        .get("grpc-message")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    (status, message)
}

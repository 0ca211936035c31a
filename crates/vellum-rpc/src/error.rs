//! Error types for the gRPC client.
//!
//! One tagged error covers the whole call path, from argument validation
//! through transport, TLS, HTTP/2, and the gRPC status surfaced by the
//! peer. Every failure is recovered to the call boundary after cleanup; no
//! partial results escape.

use thiserror::Error;

/// Errors from a unary gRPC call.
#[derive(Error, Debug)]
pub enum RpcError {
    /// Caller-supplied argument is unusable (empty target, malformed
    /// method path, oversized request).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// DNS resolution or TCP connect failed.
    #[error("connection failed: {0}")]
    ConnectFailed(String),

    /// TLS setup, handshake, or certificate verification failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The peer completed the handshake but did not select `h2`.
    #[error("server did not negotiate HTTP/2")]
    AlpnMismatch,

    /// Framing or session error from the HTTP/2 engine.
    #[error("HTTP/2 error: {0}")]
    Http2(String),

    /// Hard deadline exceeded before the response completed.
    #[error("gRPC request timed out")]
    Timeout,

    /// The peer answered with a non-zero gRPC status.
    #[error("{}", format_status(.code, .message))]
    GrpcStatus {
        /// Status code from the `grpc-status` trailer.
        code: i32,
        /// Human-readable detail from `grpc-message`, when present.
        message: Option<String>,
    },

    /// Response buffer ends before the declared gRPC frame does.
    #[error("truncated gRPC frame: need {expected} bytes, have {actual}")]
    Truncated {
        /// Bytes the frame header declared.
        expected: usize,
        /// Bytes actually buffered.
        actual: usize,
    },
}

/// Status display: prefer the peer's message, fall back to the code.
fn format_status(code: &i32, message: &Option<String>) -> String {
    match message.as_deref() {
        Some(msg) if !msg.is_empty() => msg.to_string(),
        _ => format!("gRPC error: status {code}"),
    }
}

impl From<h2::Error> for RpcError {
    fn from(err: h2::Error) -> Self {
        Self::Http2(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_prefers_peer_message() {
        let err = RpcError::GrpcStatus { code: 5, message: Some("not found".to_string()) };
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn status_display_falls_back_to_code() {
        let err = RpcError::GrpcStatus { code: 13, message: None };
        assert_eq!(err.to_string(), "gRPC error: status 13");

        let err = RpcError::GrpcStatus { code: 5, message: Some(String::new()) };
        assert_eq!(err.to_string(), "gRPC error: status 5");
    }

    #[test]
    fn truncated_reports_both_lengths() {
        let err = RpcError::Truncated { expected: 10, actual: 3 };
        assert_eq!(err.to_string(), "truncated gRPC frame: need 10 bytes, have 3");
    }
}

//! Vellum gRPC Client
//!
//! A minimal gRPC unary client for node synchronization, speaking HTTP/2
//! over TLS or cleartext TCP directly against a gRPC server. One call maps
//! to one connection, one session, one stream; there is no channel reuse,
//! pooling, or retry machinery.
//!
//! # Architecture
//!
//! - [`framing`]: the 5-byte gRPC message frame and request-head
//!   construction
//! - transport: target parsing, TCP connect, TLS with SNI and ALPN pinned
//!   to `h2`
//! - session: the HTTP/2 exchange with two-tier deadlines and trailer
//!   handling
//! - [`unary_call`]: the single public entry point composing the above
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> Result<bytes::Bytes, vellum_rpc::RpcError> {
//! let response = vellum_rpc::unary_call(
//!     "node.example.com:7447",
//!     "node.example.com",
//!     "/vellum.Sync/Fetch",
//!     b"encoded request",
//!     Some("session-token"),
//!     true,
//! )
//! .await?;
//! # Ok(response)
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod error;
pub mod framing;
mod session;
mod transport;

pub use client::{CallOptions, unary_call, unary_call_with_options};
pub use error::RpcError;

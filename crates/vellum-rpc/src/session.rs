//! HTTP/2 session for one unary exchange.
//!
//! One call owns one session and exactly one stream. The client handshake
//! advertises `MAX_CONCURRENT_STREAMS = 100` and the default 64 KiB stream
//! window; the framed request is pushed through the stream's flow-control
//! capacity and END_STREAM set when drained. The response accumulates in a
//! growable buffer until the declared gRPC frame is complete, the stream
//! ends, or a trailer carrying `grpc-status` arrives.
//!
//! # Deadlines
//!
//! Two tiers. The soft deadline accepts a response that has bytes buffered
//! but stopped making progress; the hard deadline fails the call outright
//! with [`RpcError::Timeout`]. Body polls and request-capacity waits are
//! bounded to one second each so a stalled peer always yields control back
//! to the deadline logic, whichever direction the stall is in. The call
//! clock is handed in by the orchestrator and spans the transport phase
//! too.
//!
//! # Teardown
//!
//! The connection is driven by a spawned task whose abort handle is held
//! by a guard inside the call. On every exit path, success or error, the
//! stream and response drop first, then the guard aborts the driver, which
//! drops the session, the TLS state, and the socket.

use std::{
    future::poll_fn,
    time::{Duration, Instant},
};

use bytes::{Bytes, BytesMut};
use http::Request;
use tokio::time::timeout;

use crate::{
    client::CallOptions,
    error::RpcError,
    framing::{FRAME_HEADER_SIZE, grpc_status_from_headers},
    transport::MaybeTlsStream,
};

/// SETTINGS value advertised at session bring-up.
const MAX_CONCURRENT_STREAMS: u32 = 100;

/// SETTINGS value advertised at session bring-up (protocol default).
const INITIAL_WINDOW_SIZE: u32 = 65_535;

/// Bound on a single body poll, keeping the deadline checks responsive.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Floor for receive-buffer growth.
const BUFFER_FLOOR: usize = 4096;

/// Everything the session learned about the response.
pub(crate) struct UnaryResponse {
    /// Raw buffered response bytes (a gRPC frame, possibly partial under
    /// the soft deadline).
    pub body: Bytes,

    /// `grpc-status` if any header or trailer block carried one.
    pub grpc_status: Option<i32>,

    /// `grpc-message` if present.
    pub grpc_message: Option<String>,
}

/// Growable receive buffer tracking the declared frame length.
///
/// Grows by doubling with a 4 KiB floor; once the 5-byte gRPC prefix is
/// buffered, the declared length caps further growth so a small response
/// never over-allocates.
struct ResponseBuffer {
    data: BytesMut,
    expected_total: Option<usize>,
}

impl ResponseBuffer {
    fn new() -> Self {
        Self { data: BytesMut::new(), expected_total: None }
    }

    fn extend(&mut self, chunk: &[u8]) {
        let needed = self.data.len() + chunk.len();
        if needed > self.data.capacity() {
            let mut target = (self.data.capacity() * 2).max(BUFFER_FLOOR);
            while target < needed {
                target *= 2;
            }
            if let Some(total) = self.expected_total {
                target = target.min(total.max(needed));
            }
            self.data.reserve(target - self.data.len());
        }
        self.data.extend_from_slice(chunk);

        if self.expected_total.is_none() && self.data.len() >= FRAME_HEADER_SIZE {
            let declared =
                u32::from_be_bytes([self.data[1], self.data[2], self.data[3], self.data[4]])
                    as usize;
            self.expected_total = Some(FRAME_HEADER_SIZE + declared);
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    /// True once the declared frame is fully buffered.
    fn is_complete(&self) -> bool {
        self.expected_total.is_some_and(|total| self.data.len() >= total)
    }

    fn into_bytes(self) -> Bytes {
        self.data.freeze()
    }
}

/// Aborts the connection driver when the call unwinds.
struct DriverGuard(tokio::task::AbortHandle);

impl Drop for DriverGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run one unary exchange over a fresh connection.
///
/// Consumes the transport; nothing is reused across calls. `started` is
/// the whole-call clock, already running since before the connect, so the
/// hard deadline bounds transport and session together.
pub(crate) async fn run_unary(
    io: MaybeTlsStream,
    head: Request<()>,
    request_body: Bytes,
    options: &CallOptions,
    started: Instant,
) -> Result<UnaryResponse, RpcError> {
    let handshake_wait = options.hard_deadline.saturating_sub(started.elapsed());
    let handshake = h2::client::Builder::new()
        .max_concurrent_streams(MAX_CONCURRENT_STREAMS)
        .initial_window_size(INITIAL_WINDOW_SIZE)
        .handshake(io);
    let (send_request, connection) = match timeout(handshake_wait, handshake).await {
        Ok(Ok(parts)) => parts,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(RpcError::Timeout),
    };

    let driver = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!("HTTP/2 connection ended with error: {e}");
        }
    });
    let _driver_guard = DriverGuard(driver.abort_handle());

    let ready_wait = options.hard_deadline.saturating_sub(started.elapsed());
    let mut send_request = match timeout(ready_wait, send_request.ready()).await {
        Ok(Ok(ready)) => ready,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(RpcError::Timeout),
    };
    let (response_fut, send_stream) = send_request.send_request(head, false)?;
    send_body(send_stream, request_body, started, options).await?;

    // Only the hard deadline applies while nothing is buffered yet.
    let headers_wait = options.hard_deadline.saturating_sub(started.elapsed());
    let response = match timeout(headers_wait, response_fut).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(RpcError::Timeout),
    };

    // Trailers-only responses carry grpc-status in the response HEADERS.
    let (mut status, mut message) = grpc_status_from_headers(response.headers());
    let mut buffer = ResponseBuffer::new();

    if status.is_none() {
        let mut body = response.into_body();
        let mut flow = body.flow_control().clone();

        while !buffer.is_complete() {
            if started.elapsed() >= options.hard_deadline {
                return Err(RpcError::Timeout);
            }

            match timeout(POLL_INTERVAL, body.data()).await {
                Ok(Some(Ok(chunk))) => {
                    buffer.extend(&chunk);
                    flow.release_capacity(chunk.len())?;
                },
                Ok(Some(Err(e))) => return Err(e.into()),
                Ok(None) => break, // END_STREAM
                Err(_) => {
                    let elapsed = started.elapsed();
                    if elapsed >= options.hard_deadline {
                        return Err(RpcError::Timeout);
                    }
                    if elapsed >= options.soft_deadline && !buffer.is_empty() {
                        tracing::debug!(
                            "soft deadline reached with {} bytes buffered, accepting",
                            buffer.len()
                        );
                        break;
                    }
                },
            }
        }

        // The trailer normally follows the final DATA frame immediately.
        // With bytes in hand we only wait out the soft deadline for it;
        // with nothing buffered the hard deadline still governs.
        let elapsed = started.elapsed();
        let trailer_wait = if buffer.is_empty() {
            options.hard_deadline.saturating_sub(elapsed)
        } else {
            options.soft_deadline.saturating_sub(elapsed)
        };

        match timeout(trailer_wait, body.trailers()).await {
            Ok(Ok(Some(trailers))) => {
                let (trailer_status, trailer_message) = grpc_status_from_headers(&trailers);
                status = trailer_status;
                message = trailer_message.or(message);
            },
            Ok(Ok(None)) => {},
            Ok(Err(e)) => {
                if !buffer.is_complete() {
                    return Err(e.into());
                }
                tracing::debug!("trailer read failed after complete response: {e}");
            },
            Err(_) => {
                if buffer.is_empty() {
                    return Err(RpcError::Timeout);
                }
            },
        }
    }

    Ok(UnaryResponse {
        body: buffer.into_bytes(),
        grpc_status: status,
        grpc_message: message,
    })
}

/// Push the framed request through the stream's flow-control capacity,
/// setting END_STREAM when the buffer drains.
///
/// Capacity waits are bounded like response reads: each poll is capped at
/// the poll interval and the hard deadline is re-checked every iteration,
/// so a peer that withholds flow-control credit cannot stall the call.
async fn send_body(
    mut stream: h2::SendStream<Bytes>,
    mut body: Bytes,
    started: Instant,
    options: &CallOptions,
) -> Result<(), RpcError> {
    if body.is_empty() {
        stream.send_data(body, true)?;
        return Ok(());
    }

    while !body.is_empty() {
        if started.elapsed() >= options.hard_deadline {
            return Err(RpcError::Timeout);
        }

        stream.reserve_capacity(body.len());
        match timeout(POLL_INTERVAL, poll_fn(|cx| stream.poll_capacity(cx))).await {
            Ok(Some(Ok(0))) => {},
            Ok(Some(Ok(granted))) => {
                let chunk = body.split_to(granted.min(body.len()));
                let end_stream = body.is_empty();
                stream.send_data(chunk, end_stream)?;
            },
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(None) => {
                return Err(RpcError::Http2("stream closed while sending request".to_string()));
            },
            Err(_) => {}, // no credit yet; loop re-checks the deadline
        }
    }
    Ok(())
}

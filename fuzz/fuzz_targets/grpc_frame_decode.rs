//! Fuzz target for gRPC frame decoding
//!
//! This fuzzer tests the length-prefixed frame parser with arbitrary byte
//! sequences to find:
//! - Parser crashes or panics
//! - Integer overflows in the declared-length arithmetic
//! - Buffer over-reads past the declared frame
//!
//! The fuzzer should NEVER panic. Truncated input should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use vellum_rpc::framing;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = framing::decode_frame(data) {
        // A decoded message re-frames and decodes to itself.
        let framed = framing::encode_frame(&message).expect("message fits the length field");
        let again = framing::decode_frame(&framed).expect("own framing is valid");
        assert_eq!(message, again);
    }
});

//! Wire codec for the piBridge fieldbus.
//!
//! Two addressing domains share the medium, told apart by the first byte:
//! - local I/O frames: marker, 1-byte address, 1-byte command, length
//! - gateway frames: marker, 1-byte destination, 2-byte LE command, length
//!
//! Both end in a CRC-8 over the rest of the frame. Payloads are capped by the
//! one-byte length field; oversized payloads are an error, never truncated.

pub mod codec;
pub mod domain;
pub mod error;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    checksum, decode_frame, decode_next, encode, encode_frame, frame_len_hint, parse_frame, Frame,
    TRAILER_SIZE,
};
pub use domain::{Domain, GATEWAY_MARKER, LOCAL_IO_MARKER, MAX_PAYLOAD};
pub use error::{FrameError, Result};

#[cfg(feature = "async")]
pub use async_codec::PiBridgeCodec;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crc::{Crc, CRC_8_SMBUS};

use crate::domain::{Domain, MAX_PAYLOAD};
use crate::error::{FrameError, Result};

/// Trailer: one CRC-8 byte.
pub const TRAILER_SIZE: usize = 1;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// One addressed unit on the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Addressing domain.
    pub domain: Domain,
    /// Module address (local I/O) or destination (gateway).
    pub address: u8,
    /// Command; only the low byte is valid for local I/O.
    pub command: u16,
    /// Command payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(domain: Domain, address: u8, command: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            domain,
            address,
            command,
            payload: payload.into(),
        }
    }

    /// Frame for a local I/O module.
    pub fn local_io(address: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Self::new(Domain::LocalIo, address, u16::from(command), payload)
    }

    /// Frame for a gateway-addressed module.
    pub fn gateway(destination: u8, command: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(Domain::Gateway, destination, command, payload)
    }

    /// The total wire size of this frame (header + payload + trailer).
    pub fn wire_size(&self) -> usize {
        self.domain.header_size() + self.payload.len() + TRAILER_SIZE
    }

    /// Check that every field fits its wire slot.
    pub fn validate(&self) -> Result<()> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        let max = self.domain.max_command();
        if self.command > max {
            return Err(FrameError::CommandOutOfRange {
                domain: self.domain,
                command: self.command,
                max,
            });
        }
        Ok(())
    }

    /// Returns true if `self` can be the answer to `request`.
    ///
    /// Replies carry the domain and address of the module they answer for.
    pub fn is_reply_to(&self, request: &Frame) -> bool {
        self.domain == request.domain && self.address == request.address
    }
}

/// CRC-8 (SMBus parameters) over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// local I/O: ┌──────┬─────────┬─────────┬────────┬───────────┬───────┐
///            │ 0x49 │ address │ command │ len    │ payload   │ crc8  │
///            │ 1B   │ 1B      │ 1B      │ 1B     │ len bytes │ 1B    │
///            └──────┴─────────┴─────────┴────────┴───────────┴───────┘
/// gateway:   ┌──────┬─────────┬─────────┬────────┬───────────┬───────┐
///            │ 0x47 │ dest    │ command │ len    │ payload   │ crc8  │
///            │ 1B   │ 1B      │ 2B LE   │ 1B     │ len bytes │ 1B    │
///            └──────┴─────────┴─────────┴────────┴───────────┴───────┘
/// ```
///
/// The CRC covers every byte before it. On error nothing is written to `dst`.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    frame.validate()?;

    let start = dst.len();
    dst.reserve(frame.wire_size());
    dst.put_u8(frame.domain.marker());
    dst.put_u8(frame.address);
    match frame.domain {
        Domain::LocalIo => dst.put_u8(frame.command as u8),
        Domain::Gateway => dst.put_u16_le(frame.command),
    }
    dst.put_u8(frame.payload.len() as u8);
    dst.put_slice(&frame.payload);
    let crc = checksum(&dst[start..]);
    dst.put_u8(crc);
    Ok(())
}

/// Encode a frame into a fresh buffer.
pub fn encode(frame: &Frame) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(frame.wire_size());
    encode_frame(frame, &mut dst)?;
    Ok(dst.freeze())
}

/// How many bytes the frame starting at `src[0]` needs in total, as far as
/// can be told from the bytes present.
///
/// Returns 1 for an empty buffer and the header size until the length byte
/// has arrived. Fails only on an unknown domain marker.
pub fn frame_len_hint(src: &[u8]) -> Result<usize> {
    let Some(&marker) = src.first() else {
        return Ok(1);
    };
    let domain = Domain::from_marker(marker).ok_or(FrameError::UnknownDomain(marker))?;
    let header = domain.header_size();
    if src.len() < header {
        return Ok(header);
    }
    Ok(header + src[header - 1] as usize + TRAILER_SIZE)
}

/// Parse the frame at the start of `src`.
///
/// Returns the frame and the number of bytes it occupies; bytes after it
/// are left alone. Fails with [`FrameError::Truncated`] if `src` ends early.
pub fn parse_frame(src: &[u8]) -> Result<(Frame, usize)> {
    let needed = frame_len_hint(src)?;
    if src.len() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.len(),
        });
    }

    // frame_len_hint succeeded on a non-empty buffer, so the marker is known
    // and the full header is present.
    let marker = src[0];
    let domain = Domain::from_marker(marker).ok_or(FrameError::UnknownDomain(marker))?;
    let header = domain.header_size();

    let expected = checksum(&src[..needed - TRAILER_SIZE]);
    let actual = src[needed - TRAILER_SIZE];
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    let command = match domain {
        Domain::LocalIo => u16::from(src[2]),
        Domain::Gateway => u16::from_le_bytes([src[2], src[3]]),
    };
    let payload = Bytes::copy_from_slice(&src[header..needed - TRAILER_SIZE]);

    Ok((
        Frame {
            domain,
            address: src[1],
            command,
            payload,
        },
        needed,
    ))
}

/// Decode a buffer holding exactly one frame.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let (frame, used) = parse_frame(src)?;
    if used != src.len() {
        return Err(FrameError::LengthMismatch {
            declared: used,
            actual: src.len(),
        });
    }
    Ok(frame)
}

/// Decode the next frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_next(src: &mut BytesMut) -> Result<Option<Frame>> {
    match parse_frame(src) {
        Ok((frame, used)) => {
            src.advance(used);
            Ok(Some(frame))
        }
        Err(err) if err.is_incomplete() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(frame: &Frame) -> Vec<u8> {
        encode(frame).unwrap().to_vec()
    }

    #[test]
    fn local_io_layout() {
        let bytes = wire(&Frame::local_io(0x05, 0x10, vec![0x01, 0x02]));
        assert_eq!(&bytes[..6], &[0x49, 0x05, 0x10, 0x02, 0x01, 0x02]);
        assert_eq!(bytes[6], checksum(&bytes[..6]));
    }

    #[test]
    fn gateway_layout() {
        let bytes = wire(&Frame::gateway(0x20, 0x1234, vec![0xAA]));
        assert_eq!(&bytes[..6], &[0x47, 0x20, 0x34, 0x12, 0x01, 0xAA]);
        assert_eq!(bytes.len(), 7);
    }

    #[test]
    fn roundtrip_preserves_fields() {
        let cases = [
            Frame::local_io(1, 0, Vec::new()),
            Frame::local_io(63, 0xFF, vec![0x55; MAX_PAYLOAD]),
            Frame::gateway(0, 0xFFFF, vec![0x00, 0xFF]),
            Frame::gateway(0xFE, 0x8001, vec![7; 100]),
        ];
        for frame in cases {
            let decoded = decode_frame(&wire(&frame)).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn oversized_payload_writes_nothing() {
        let mut dst = BytesMut::from(&b"keep"[..]);
        let frame = Frame::gateway(1, 1, vec![0u8; MAX_PAYLOAD + 1]);
        let err = encode_frame(&frame, &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 256, max: 255 }));
        assert_eq!(dst.as_ref(), b"keep");
    }

    #[test]
    fn wide_command_rejected_for_local_io() {
        let frame = Frame::new(Domain::LocalIo, 1, 0x100, Bytes::new());
        let err = encode(&frame).unwrap_err();
        assert!(matches!(
            err,
            FrameError::CommandOutOfRange {
                domain: Domain::LocalIo,
                command: 0x100,
                ..
            }
        ));
    }

    #[test]
    fn truncated_input() {
        let bytes = wire(&Frame::local_io(2, 3, vec![1, 2, 3]));
        let err = decode_frame(&bytes[..bytes.len() - 2]).unwrap_err();
        assert_eq!(
            err,
            FrameError::Truncated {
                needed: bytes.len(),
                available: bytes.len() - 2
            }
        );
        assert!(matches!(
            decode_frame(&[]),
            Err(FrameError::Truncated { needed: 1, .. })
        ));
    }

    #[test]
    fn unknown_marker() {
        let err = decode_frame(&[0x00, 0x01, 0x02, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, FrameError::UnknownDomain(0x00));
    }

    #[test]
    fn trailing_bytes_are_a_length_mismatch() {
        let mut bytes = wire(&Frame::local_io(2, 3, vec![9]));
        let declared = bytes.len();
        bytes.push(0xEE);
        let err = decode_frame(&bytes).unwrap_err();
        assert_eq!(
            err,
            FrameError::LengthMismatch {
                declared,
                actual: declared + 1
            }
        );
    }

    #[test]
    fn corrupted_byte_fails_checksum() {
        let mut bytes = wire(&Frame::gateway(3, 0x0102, vec![1, 2, 3]));
        bytes[6] ^= 0x40;
        assert!(matches!(
            decode_frame(&bytes),
            Err(FrameError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn len_hint_grows_with_known_fields() {
        let bytes = wire(&Frame::gateway(3, 7, vec![0; 10]));
        assert_eq!(frame_len_hint(&[]).unwrap(), 1);
        assert_eq!(frame_len_hint(&bytes[..1]).unwrap(), 5);
        assert_eq!(frame_len_hint(&bytes[..4]).unwrap(), 5);
        assert_eq!(frame_len_hint(&bytes[..5]).unwrap(), bytes.len());
        assert!(frame_len_hint(&[0x13]).is_err());
    }

    #[test]
    fn decode_next_streams_frames() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::local_io(1, 1, vec![1]), &mut buf).unwrap();
        encode_frame(&Frame::gateway(2, 2, vec![2, 2]), &mut buf).unwrap();
        let tail = wire(&Frame::local_io(3, 3, vec![3]));
        buf.extend_from_slice(&tail[..2]);

        let f1 = decode_next(&mut buf).unwrap().unwrap();
        let f2 = decode_next(&mut buf).unwrap().unwrap();
        assert_eq!((f1.domain, f1.address), (Domain::LocalIo, 1));
        assert_eq!((f2.domain, f2.address), (Domain::Gateway, 2));
        assert!(decode_next(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn reply_matching_uses_domain_and_address() {
        let request = Frame::local_io(5, 0x10, Bytes::new());
        assert!(Frame::local_io(5, 0x11, vec![1]).is_reply_to(&request));
        assert!(!Frame::local_io(6, 0x10, vec![1]).is_reply_to(&request));
        assert!(!Frame::gateway(5, 0x10, vec![1]).is_reply_to(&request));
    }

    #[test]
    fn frame_wire_size() {
        assert_eq!(Frame::local_io(1, 1, vec![0; 4]).wire_size(), 4 + 4 + 1);
        assert_eq!(Frame::gateway(1, 1, vec![0; 4]).wire_size(), 5 + 4 + 1);
    }
}

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{decode_next, encode_frame, Frame};

/// `tokio_util` codec for bridge frames.
///
/// Decoding resynchronises on its own: a byte that cannot start a valid
/// frame (unknown marker, bad checksum) is dropped and parsing resumes at
/// the next byte.
#[derive(Debug, Default, Clone)]
pub struct PiBridgeCodec {
    skipped: u64,
}

impl PiBridgeCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes dropped while resynchronising.
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }
}

impl Decoder for PiBridgeCodec {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match decode_next(src) {
                Ok(frame) => return Ok(frame),
                Err(err) => {
                    debug!(error = %err, "dropping byte to resynchronise");
                    src.advance(1);
                    self.skipped += 1;
                }
            }
        }
    }
}

impl Encoder<Frame> for PiBridgeCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::codec::encode;

    #[tokio::test]
    async fn framed_read_skips_garbage() {
        let mut wire = vec![0x00, 0x13, 0x37];
        wire.extend_from_slice(&encode(&Frame::local_io(4, 0x20, vec![1, 2])).unwrap());
        wire.extend_from_slice(&encode(&Frame::gateway(9, 0x0300, vec![3])).unwrap());

        let mut framed = FramedRead::new(wire.as_slice(), PiBridgeCodec::new());
        let first = framed.next().await.unwrap().unwrap();
        let second = framed.next().await.unwrap().unwrap();

        assert_eq!(first, Frame::local_io(4, 0x20, vec![1, 2]));
        assert_eq!(second, Frame::gateway(9, 0x0300, vec![3]));
        assert_eq!(framed.decoder().skipped_bytes(), 3);
    }

    #[tokio::test]
    async fn framed_write_encodes() {
        let mut framed = FramedWrite::new(Vec::new(), PiBridgeCodec::new());
        framed.send(Frame::local_io(1, 2, vec![3])).await.unwrap();

        let written = framed.into_inner();
        assert_eq!(written, encode(&Frame::local_io(1, 2, vec![3])).unwrap().to_vec());
    }

    #[tokio::test]
    async fn invalid_frame_is_rejected_on_encode() {
        let mut framed = FramedWrite::new(Vec::new(), PiBridgeCodec::new());
        let err = framed
            .send(Frame::gateway(1, 2, vec![0; 300]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}

use crate::protocol::{PayloadItem, PayloadSize, SendError};
use bytes::BytesMut;

use tokio_util::codec::Encoder;
use tracing::warn;

/// Writes the payload of a response after its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
    finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload, holding the bytes still owed to the client
    Length(u64),

    /// a declared content-length the body does not have to honour
    Declared,

    /// have no body with the response
    NoBody,
}

impl PayloadEncoder {
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody, finished: false }
    }

    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(size), finished: false }
    }

    pub fn declared() -> Self {
        Self { kind: Kind::Declared, finished: false }
    }

    /// True once the EOF item has been encoded.
    pub fn is_finish(&self) -> bool {
        self.finished
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => PayloadEncoder::fix_length(size),
            PayloadSize::Declared(_) => PayloadEncoder::declared(),
            PayloadSize::Empty | PayloadSize::Chunked => PayloadEncoder::empty(),
        }
    }
}

impl Encoder<PayloadItem> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = match item {
            PayloadItem::Chunk(bytes) => bytes,
            PayloadItem::Eof => {
                if let Kind::Length(remaining @ 1..) = self.kind {
                    return Err(SendError::invalid_body(format!("body ended {remaining} bytes before content-length")));
                }
                self.finished = true;
                return Ok(());
            }
        };

        match &mut self.kind {
            Kind::Length(remaining) => {
                let len = bytes.len() as u64;
                if len > *remaining {
                    return Err(SendError::invalid_body(format!("body exceeds content-length by {} bytes", len - *remaining)));
                }
                *remaining -= len;
                dst.extend_from_slice(&bytes);
                Ok(())
            }
            Kind::Declared => {
                dst.extend_from_slice(&bytes);
                Ok(())
            }
            Kind::NoBody => {
                if !bytes.is_empty() {
                    warn!(size = bytes.len(), "drop payload of a response without body");
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn length_must_match() {
        let mut dst = BytesMut::new();
        let mut encoder = PayloadEncoder::fix_length(3);

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ab")), &mut dst).unwrap();
        assert!(encoder.encode(PayloadItem::Eof, &mut dst).is_err());

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"c")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"abc");
    }

    #[test]
    fn length_rejects_overflow() {
        let mut dst = BytesMut::new();
        let mut encoder = PayloadEncoder::fix_length(1);
        assert!(encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"ab")), &mut dst).is_err());
    }

    #[test]
    fn declared_passes_short_body_through() {
        let mut dst = BytesMut::new();
        let mut encoder = PayloadEncoder::from(PayloadSize::Declared(2300));

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"incomplete")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"incomplete");
    }
}

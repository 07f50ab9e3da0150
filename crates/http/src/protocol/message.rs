use bytes::Bytes;

/// What flows through the codecs: a message head, then its payload in pieces.
///
/// Decoding yields `Message<(RequestHeader, PayloadSize)>`, encoding takes
/// `Message<(ResponseHead, PayloadSize)>`.
#[derive(Debug)]
pub enum Message<T> {
    Header(T),
    Payload(PayloadItem),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    /// No more payload for the current message.
    Eof,
}

/// How a payload is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    /// Chunked transfer coding. Requests only, responses are always sent with a length.
    Chunked,
    /// A handler chosen `Content-Length` that the payload does not have to match.
    Declared(u64),
    Empty,
}

impl PayloadSize {
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T> Message<T> {
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    pub fn into_payload_item(self) -> Option<PayloadItem> {
        match self {
            Message::Header(_) => None,
            Message::Payload(item) => Some(item),
        }
    }
}

impl PayloadItem {
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_is_empty() {
        assert!(PayloadSize::new_length(0).is_empty());
        assert_eq!(PayloadSize::new_length(12), PayloadSize::Length(12));
        assert!(!PayloadSize::Declared(0).is_empty());
    }

    #[test]
    fn payload_items() {
        let message: Message<()> = Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"abc")));
        let item = message.into_payload_item().unwrap();
        assert!(item.is_chunk());
        assert!(!item.is_eof());

        assert!(Message::Header(()).into_payload_item().is_none());
    }
}

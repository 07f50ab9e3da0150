//! HTTP response header encoder
//!
//! Serializes the status line and header fields of a [`ResponseHead`]. `Content-Length` is
//! normally derived from the [`PayloadSize`]; a [`PayloadSize::Declared`] payload keeps the
//! handler's own value so that a response can deliberately promise more bytes than it sends.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, StatusCode, Version, header};
use std::io;
use std::io::{ErrorKind, Write};
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP response headers.
#[derive(Debug, Clone, Copy)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match header.version() {
            Version::HTTP_11 | Version::HTTP_10 => {
                write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", header.status().as_str(), reason_phrase(header.status()))?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        match payload_size {
            PayloadSize::Length(n) => {
                header.headers_mut().insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Empty => {
                const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
                header.headers_mut().insert(header::CONTENT_LENGTH, ZERO_VALUE);
            }
            PayloadSize::Declared(n) => {
                header.headers_mut().entry(header::CONTENT_LENGTH).or_insert_with(|| n.into());
            }
            PayloadSize::Chunked => {
                header.headers_mut().insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
            }
        }

        for (header_name, header_value) in header.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Status codes such as 299 or 599 have no registered reason phrase but are still valid.
fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("UNKNOWN")
}

/// Writes straight into the already reserved `BytesMut`.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Response;

    fn encode(head: ResponseHead, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn length_overrides_handler_value() {
        let head = Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, 99).body(()).unwrap();
        let encoded = encode(head, PayloadSize::Length(17));

        assert!(encoded.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(encoded.contains("content-length: 17\r\n"));
        assert!(!encoded.contains("99"));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn declared_length_is_kept() {
        let head = Response::builder().status(StatusCode::OK).header(header::CONTENT_LENGTH, 2300).body(()).unwrap();
        let encoded = encode(head, PayloadSize::Declared(4));

        assert!(encoded.contains("content-length: 2300\r\n"));
    }

    #[test]
    fn declared_length_fills_missing_header() {
        let head = Response::builder().status(StatusCode::OK).body(()).unwrap();
        let encoded = encode(head, PayloadSize::Declared(2300));

        assert!(encoded.contains("content-length: 2300\r\n"));
    }

    #[test]
    fn unregistered_status_code() {
        let head = Response::builder().status(599).body(()).unwrap();
        let encoded = encode(head, PayloadSize::Empty);

        assert!(encoded.starts_with("HTTP/1.1 599 UNKNOWN\r\n"));
        assert!(encoded.contains("content-length: 0\r\n"));
    }
}

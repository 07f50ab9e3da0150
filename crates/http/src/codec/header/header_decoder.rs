//! HTTP request header decoder
//!
//! Parses the request line and header fields with `httparse`, converts them into a typed
//! [`RequestHeader`] and decides how the payload that follows is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header block: 64KB
//! - HTTP/1.0 and HTTP/1.1 only

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire header section
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder;

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode a request header from `src`.
    ///
    /// - `Ok(Some((header, payload_size)))` once the header block is complete, the header bytes
    ///   are removed from `src`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` for malformed or oversized headers
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "GET / HTTP/1.1\r\n\r\n" is the smallest request worth handing to httparse
        if src.len() < 14 {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let parsed_result = req.parse(src).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            e => ParseError::invalid_header(e.to_string()),
        });

        let body_offset = match parsed_result? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(header_size = body_offset, "parsed request header");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = match req.version {
            Some(0) => http::Version::HTTP_10,
            Some(1) => http::Version::HTTP_11,
            v => return Err(ParseError::InvalidVersion(v)),
        };

        let mut builder = Request::builder()
            .method(req.method.ok_or(ParseError::InvalidMethod)?)
            .uri(req.path.ok_or(ParseError::InvalidUri)?)
            .version(version);

        for header in req.headers.iter() {
            let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_header)?;
            let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_header)?;
            builder = builder.header(name, value);
        }

        // the builder only fails on invalid method or uri at this point
        let request = builder.body(()).map_err(|e| match e {
            e if e.is::<http::method::InvalidMethod>() => ParseError::InvalidMethod,
            _ => ParseError::InvalidUri,
        })?;

        let _ = src.split_to(body_offset);

        let header = RequestHeader::from(request);
        let payload_size = parse_payload(&header)?;

        Ok(Some((header, payload_size)))
    }
}

/// How the request payload is framed (RFC 9112 section 6).
///
/// A request carrying both `Transfer-Encoding` and `Content-Length` is rejected rather than
/// guessed at.
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    let transfer_encoding = header.headers().get(http::header::TRANSFER_ENCODING);
    let content_length = header.headers().get(http::header::CONTENT_LENGTH);

    match (transfer_encoding, content_length) {
        (None, None) => Ok(PayloadSize::Empty),
        (Some(coding), None) if is_chunked(coding) => Ok(PayloadSize::Chunked),
        (Some(_), None) => Ok(PayloadSize::Empty),
        (None, Some(length)) => {
            let length = length.to_str().map_err(ParseError::invalid_content_length)?;
            let length = length
                .trim()
                .parse::<u64>()
                .map_err(|e| ParseError::invalid_content_length(format!("'{length}': {e}")))?;
            Ok(PayloadSize::new_length(length))
        }
        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("both transfer-encoding and content-length are present")),
    }
}

/// Chunked must be the last coding of `Transfer-Encoding` to apply.
fn is_chunked(header_value: &HeaderValue) -> bool {
    header_value.as_bytes().rsplit(|b| *b == b',').next().is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}

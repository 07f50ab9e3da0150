//! Streaming codecs for HTTP/1.x messages
//!
//! - Request handling:
//!   - [`RequestDecoder`]: decodes the request header, then its payload
//!   - header parsing via the `header` module
//!   - payload decoding via the `body` module
//!
//! - Response handling:
//!   - [`ResponseEncoder`]: encodes the response head, then its payload
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use hamms_http::codec::RequestDecoder;
//! use hamms_http::protocol::Message;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from("GET /?status=418 HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let message = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert!(message.is_header());
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;

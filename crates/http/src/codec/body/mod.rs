//! HTTP body handling
//!
//! ## Decoders
//! - `LengthDecoder`: fixed-length request payloads
//! - `ChunkedDecoder`: chunked transfer coded request payloads
//! - [`PayloadDecoder`]: picks one of the above from the request's [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! ## Encoders
//! - [`PayloadEncoder`]: writes response payloads, either checked against the encoded
//!   `Content-Length` or passed through untouched for declared lengths

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

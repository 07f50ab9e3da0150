//! HTTP header processing
//!
//! - [`HeaderDecoder`]: decodes request headers from raw bytes and picks the payload framing
//! - [`HeaderEncoder`]: writes the status line and response headers, setting
//!   `Content-Length` from the payload size unless the handler declared its own

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;

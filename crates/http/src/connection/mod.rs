//! HTTP connection handling
//!
//! [`HttpConnection`] drives one accepted connection: it decodes requests, buffers their
//! bodies, answers `Expect: 100-continue`, invokes the handler and writes the response. The
//! connection is kept alive until the client asks to close it, the client goes away, or a
//! response declared its own `Content-Length`.

mod http_connection;

pub use http_connection::HttpConnection;

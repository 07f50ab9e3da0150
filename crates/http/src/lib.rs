//! HTTP/1.1 plumbing for the hamms misbehaving server
//!
//! This crate provides the small, well-behaved part of hamms: a streaming HTTP/1.1 request
//! decoder, a response encoder and a connection driver built on top of tokio. The behaviors
//! that deliberately break the protocol live in the `hamms` crate and use this crate whenever
//! they need a *parsed* request rather than raw socket bytes.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request parsing via `httparse`
//! - Content-Length and chunked request bodies
//! - Keep-alive connections
//! - Expect-continue mechanism
//! - Responses that keep a handler supplied `Content-Length` untouched, see
//!   [`protocol::DeclaredLength`]
//!
//! # Example
//!
//! ```no_run
//! use std::error::Error;
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use hamms_http::connection::HttpConnection;
//! use hamms_http::handler::make_handler;
//! use hamms_http::protocol::ConnectionInfo;
//! use http::{Request, Response, StatusCode};
//! use http_body_util::Full;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(tcp_listener) => tcp_listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     let handler = Arc::new(make_handler(hello_world));
//!
//!     loop {
//!         let (tcp_stream, remote_addr) = match tcp_listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let handler = handler.clone();
//!         let info = ConnectionInfo::new(Some(remote_addr), tcp_stream.local_addr().ok());
//!
//!         tokio::spawn(async move {
//!             let (reader, writer) = tcp_stream.into_split();
//!             let connection = HttpConnection::new(reader, writer, info);
//!             if let Err(e) = connection.process(handler).await {
//!                 error!(cause = %e, "connection shutdown with error");
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request<Bytes>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
//!     info!(path = request.uri().path(), "receive request");
//!     let mut response = Response::new(Full::new(Bytes::from_static(b"Hello World!\r\n")));
//!     *response.status_mut() = StatusCode::OK;
//!     Ok(response)
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: connection lifecycle, one request at a time
//! - [`protocol`]: request/response types, payload sizes and errors
//! - [`codec`]: `tokio-util` decoders and encoders for the wire format
//! - [`handler`]: the [`handler::Handler`] trait invoked per request
//!
//! # Limitations
//!
//! - HTTP/1.x only, no TLS
//! - Maximum header block: 64KB
//! - Maximum number of headers: 64
//! - Request bodies are buffered completely before the handler runs

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;

//! A deliberately broken multi-port server for testing http clients
//!
//! Every port serves exactly one kind of misbehavior: connections that never answer, garbage
//! instead of a status line, bodies that lie about their length, responses trickled out one
//! byte at a time, servers that fail a number of times before succeeding, and so on. Point an
//! http client at `base_port + offset` and check that it times out, retries or fails the way
//! you expect. The full port map lives in [`registry::BEHAVIORS`].
//!
//! # Example
//!
//! ```no_run
//! use hamms::{HammsConfig, HammsServer};
//!
//! let server = HammsServer::new(HammsConfig::builder().seed(7).build());
//! server.start(5500).expect("ports 5501..=5516 should be free");
//!
//! // 5509 answers with the status code asked for in the query string
//! // GET http://127.0.0.1:5509/?status=503
//!
//! server.stop();
//! ```
//!
//! # Architecture
//!
//! - [`registry`]: the behavior table and the port each behavior listens on
//! - [`raw`]: behaviors that speak raw bytes on the socket, plus the [`drip`] scheduler
//! - [`web`]: behaviors that need a parsed request, served through `hamms-http`
//! - [`retry_store`]: the counters behind the retries behavior
//! - [`server`]: binds every port and runs them on a single event loop thread

pub mod access_log;
pub mod canonical;
pub mod config;
pub mod drip;
pub mod error;
pub mod morse;
pub mod raw;
pub mod registry;
pub mod retry_store;
pub mod server;
pub mod web;

pub use config::HammsConfig;
pub use error::{AccessLogError, StartError};
pub use retry_store::RetryStore;
pub use server::{HammsServer, serve};

/// Version advertised in the `Server` header.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Value of the `Server` header on every response hamms writes itself.
pub const SERVER_HEADER: &str = concat!("Hamms/", env!("CARGO_PKG_VERSION"));

/// First port of the default port range; behaviors listen on `DEFAULT_BASE_PORT + offset`.
pub const DEFAULT_BASE_PORT: u16 = 5500;

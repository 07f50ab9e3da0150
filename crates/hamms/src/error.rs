use std::io;
use std::str::Utf8Error;

use thiserror::Error;

use crate::registry::BehaviorId;

/// Why the listeners could not be brought up.
///
/// No listener stays bound when start fails.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("base port {base_port} leaves no room for port offset {offset}")]
    PortOutOfRange { base_port: u16, offset: u16 },

    #[error("can't listen for {behavior} on port {port}: {source}")]
    Bind {
        behavior: BehaviorId,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("invalid route table: {source}")]
    Route {
        #[from]
        source: matchit::InsertError,
    },

    #[error("can't start the event loop: {source}")]
    Runtime {
        #[from]
        source: io::Error,
    },
}

impl StartError {
    pub fn bind(behavior: BehaviorId, port: u16, source: io::Error) -> Self {
        Self::Bind { behavior, port, source }
    }
}

/// An access line that could not be rendered.
#[derive(Debug, Error)]
pub enum AccessLogError {
    #[error("request line is not valid utf-8: {source}")]
    RequestLine {
        #[from]
        source: Utf8Error,
    },
}

use std::io;
use thiserror::Error;

/// Why a connection stopped being served.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("can't read request: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("can't send response: {source}")]
    Send {
        #[from]
        source: SendError,
    },
}

/// A request that could not be decoded. The connection answers it with `400 Bad Request`.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header block of {current_size} bytes exceeds the {max_size} byte limit")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("more than {max_num} headers")]
    TooManyHeaders { max_num: usize },

    #[error("body of {current_size} bytes exceeds the {max_size} byte limit")]
    TooLargeBody { current_size: usize, max_size: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("unsupported http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid request target")]
    InvalidUri,

    #[error("invalid content-length: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_header(reason: impl ToString) -> Self {
        Self::InvalidHeader { reason: reason.to_string() }
    }

    pub fn invalid_content_length(reason: impl ToString) -> Self {
        Self::InvalidContentLength { reason: reason.to_string() }
    }

    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid response body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody { reason: reason.to_string() }
    }

    pub fn io(e: impl Into<io::Error>) -> Self {
        Self::Io { source: e.into() }
    }
}

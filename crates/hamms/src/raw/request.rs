//! Just enough request parsing for the raw behaviors.
//!
//! Raw behaviors see whatever bytes the peer sent in one read, possibly a partial request or
//! not http at all, so every lookup here is lenient and never fails the connection by itself.

use std::str;

use http::Uri;
use thiserror::Error;

/// Why a request line could not be used.
#[derive(Debug, Error)]
pub enum RequestLineError {
    #[error("request line is not valid utf-8: {source}")]
    NotUtf8 {
        #[from]
        source: str::Utf8Error,
    },

    #[error("expected 'METHOD TARGET VERSION', got {parts} parts")]
    Shape { parts: usize },

    #[error("invalid request target: {source}")]
    Target {
        #[from]
        source: http::uri::InvalidUri,
    },

    #[error("invalid query string: {source}")]
    Query {
        #[from]
        source: serde_urlencoded::de::Error,
    },
}

/// Everything before the first CRLF, or all of `data` when there is none.
pub fn first_line(data: &[u8]) -> &[u8] {
    data.windows(2).position(|w| w == b"\r\n").map_or(data, |end| &data[..end])
}

/// Value of the first header called `name`, compared case-insensitively.
///
/// Lines are scanned from the second line up to the first empty line; a missing header, a
/// line without a colon or a non utf-8 value is skipped.
pub fn header<'a>(data: &'a [u8], name: &str) -> Option<&'a str> {
    data.split(|b| *b == b'\n')
        .skip(1)
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let colon = line.iter().position(|b| *b == b':')?;
            let (key, value) = line.split_at(colon);
            key.trim_ascii().eq_ignore_ascii_case(name.as_bytes()).then_some(&value[1..])
        })
        .find_map(|value| str::from_utf8(value.trim_ascii()).ok())
}

/// A request line split into its three parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLine<'a> {
    pub method: &'a str,
    pub target: &'a str,
    pub version: &'a str,
}

impl<'a> RequestLine<'a> {
    /// Splits the first line of `data` on single spaces, exactly three parts are accepted.
    pub fn parse(data: &'a [u8]) -> Result<Self, RequestLineError> {
        let line = str::from_utf8(first_line(data))?;

        let parts: Vec<&str> = line.split(' ').collect();
        match parts[..] {
            [method, target, version] => Ok(Self { method, target, version }),
            _ => Err(RequestLineError::Shape { parts: parts.len() }),
        }
    }

    /// The last value of query parameter `name` in the request target.
    pub fn query_value(&self, name: &str) -> Result<Option<String>, RequestLineError> {
        let uri: Uri = self.target.parse()?;
        let Some(query) = uri.query() else {
            return Ok(None);
        };

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)?;
        Ok(pairs.into_iter().rev().find(|(key, _)| key == name).map(|(_, value)| value))
    }
}

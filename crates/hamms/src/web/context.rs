//! Request data handed to the http behaviors.

use bytes::Bytes;
use hamms_http::protocol::{ConnectionInfo, RequestHeader};
use http::{HeaderMap, Method, Uri, header};
use tracing::debug;

use super::accept::MimeAccept;

/// A fully read request: header, buffered body and connection metadata.
#[derive(Debug)]
pub struct RequestContext {
    header: RequestHeader,
    body: Bytes,
    info: ConnectionInfo,
}

impl RequestContext {
    pub fn new(header: RequestHeader, body: Bytes, info: ConnectionInfo) -> Self {
        Self { header, body, info }
    }

    pub fn request_header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn info(&self) -> ConnectionInfo {
        self.info
    }

    pub fn full_path(&self) -> &str {
        self.header.full_path()
    }

    /// The `User-Agent` header, empty when missing or not visible ascii.
    pub fn user_agent(&self) -> &str {
        self.headers().get(header::USER_AGENT).and_then(|value| value.to_str().ok()).unwrap_or_default()
    }

    pub fn accept(&self) -> MimeAccept {
        MimeAccept::parse(self.headers().get(header::ACCEPT).and_then(|value| value.to_str().ok()))
    }

    /// Pairs from the query string, in order. An undecodable query string yields nothing.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri().query().map(decode_pairs).unwrap_or_default()
    }

    /// Pairs from an `application/x-www-form-urlencoded` body, in order.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        if !self.is_form() || self.body.is_empty() {
            return Vec::new();
        }

        match std::str::from_utf8(&self.body) {
            Ok(body) => decode_pairs(body),
            Err(e) => {
                debug!(cause = %e, "form body is not utf-8, ignoring it");
                Vec::new()
            }
        }
    }

    /// First value of `name`, looked up in the query string, then in the form body.
    pub fn param(&self, name: &str) -> Option<String> {
        let first = |pairs: Vec<(String, String)>| pairs.into_iter().find(|(key, _)| key == name).map(|(_, value)| value);
        first(self.query_pairs()).or_else(|| first(self.form_pairs()))
    }

    fn is_form(&self) -> bool {
        self.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .is_some_and(|content_type| content_type.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
    }
}

fn decode_pairs(encoded: &str) -> Vec<(String, String)> {
    serde_urlencoded::from_str(encoded).unwrap_or_else(|e| {
        debug!(cause = %e, "can't decode url encoded pairs");
        Vec::new()
    })
}

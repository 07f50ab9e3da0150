//! HTTP request header handling.
//!
//! [`RequestHeader`] wraps `http::Request<()>` with the few questions the connection layer
//! asks before a body is attached: does the method carry a body, should the connection be
//! kept alive, and what is the path as the client sent it.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version, header};

/// A parsed HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Path plus query string, e.g. `/counters?key=a`.
    pub fn full_path(&self) -> &str {
        self.uri().path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Determines if this request may carry a body based on its HTTP method.
    ///
    /// Returns false for methods that typically don't have bodies:
    /// GET, HEAD, DELETE, OPTIONS and CONNECT.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the client expects the connection to stay open after the response.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is present, HTTP/1.0 only
    /// keeps the connection when `Connection: keep-alive` is present.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers().get(header::CONNECTION).and_then(|value| value.to_str().ok());
        let has_token = |token: &str| {
            connection.is_some_and(|value| value.split(',').any(|item| item.trim().eq_ignore_ascii_case(token)))
        };

        match self.version() {
            Version::HTTP_11 => !has_token("close"),
            _ => has_token("keep-alive"),
        }
    }
}

impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(version: Version, connection: Option<&str>) -> RequestHeader {
        let mut builder = Request::builder().method(Method::GET).uri("/index/?a=1&b=2").version(version);
        if let Some(value) = connection {
            builder = builder.header(header::CONNECTION, value);
        }
        builder.body(()).unwrap().into()
    }

    #[test]
    fn keep_alive_defaults() {
        assert!(header(Version::HTTP_11, None).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("close")).is_keep_alive());
        assert!(!header(Version::HTTP_11, Some("Upgrade, Close")).is_keep_alive());

        assert!(!header(Version::HTTP_10, None).is_keep_alive());
        assert!(header(Version::HTTP_10, Some("Keep-Alive")).is_keep_alive());
    }

    #[test]
    fn full_path_keeps_query() {
        let header = header(Version::HTTP_11, None);
        assert_eq!(header.full_path(), "/index/?a=1&b=2");
        assert_eq!(header.uri().path(), "/index/");
        assert!(!header.need_body());
    }

    #[test]
    fn attach_body() {
        let request = header(Version::HTTP_11, None).body("payload");
        assert_eq!(*request.body(), "payload");
        assert_eq!(request.method(), Method::GET);
    }
}

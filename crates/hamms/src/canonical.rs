//! Canonical responses: a body and headers for any status code, and the request header echo.
//!
//! A few status codes get a memorable body or the header a client would expect with them,
//! everything else answers with an empty body.

use std::collections::BTreeMap;

use bytes::Bytes;
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

const REDIRECT_LOCATION: &str = "/redirect/1";

const ACCEPTED_MEDIA_TYPES: [&str; 5] = ["image/webp", "image/svg+xml", "image/jpeg", "image/png", "image/*"];

const TEAPOT: &str = r#"
    -=[ teapot ]=-

       _...._
     .'  _ _ `.
    | ."` ^ `". _,
    \_;`"---"`|//
      |       ;/
      \_     _/
        `"""`
"#;

/// The response a well-known status code comes with.
pub fn status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = match status.as_u16() {
        301 | 302 | 303 | 305 | 307 => with_header(empty(), header::LOCATION, REDIRECT_LOCATION),
        401 => with_header(empty(), header::WWW_AUTHENTICATE, FAKE_REALM),
        402 => with_header(Response::new(Full::from("Fuck you, pay me!")), X_MORE_INFO, "http://vimeo.com/22053820"),
        406 => {
            let body = json!({
                "message": "Client did not request a supported media type.",
                "accept": ACCEPTED_MEDIA_TYPES,
            });
            with_header(Response::new(Full::from(body.to_string())), header::CONTENT_TYPE, "application/json")
        }
        407 => with_header(empty(), header::PROXY_AUTHENTICATE, FAKE_REALM),
        418 => with_header(Response::new(Full::from(TEAPOT)), X_MORE_INFO, "http://tools.ietf.org/html/rfc2324"),
        _ => empty(),
    };

    *response.status_mut() = status;
    response
}

const X_MORE_INFO: HeaderName = HeaderName::from_static("x-more-info");
const FAKE_REALM: &str = r#"Basic realm="Fake Realm""#;

fn empty() -> Response<Full<Bytes>> {
    Response::new(Full::default())
}

fn with_header(mut response: Response<Full<Bytes>>, name: HeaderName, value: &'static str) -> Response<Full<Bytes>> {
    response.headers_mut().insert(name, HeaderValue::from_static(value));
    response
}

/// Request headers keyed by their title-cased name, repeated headers joined with a comma.
///
/// Values that are not visible ascii are decoded lossily.
pub fn echo_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut echoed: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        echoed
            .entry(title_case(name.as_str()))
            .and_modify(|joined| {
                joined.push(',');
                joined.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    echoed
}

/// `{"headers": {...}}`, the body of the echo responses.
pub fn headers_body(headers: &HeaderMap) -> serde_json::Value {
    json!({ "headers": echo_headers(headers) })
}

/// `content-type` becomes `Content-Type`.
pub fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// A json response with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(body) {
        Ok(body) => body,
        Err(e) => {
            warn!(cause = %e, "can't serialize json body");
            return status_response(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// A 200 response with the given content type.
pub fn typed_response(content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

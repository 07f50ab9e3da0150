//! The http behaviors, each served on `/` of its own port.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hamms_http::protocol::DeclaredLength;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use http::{HeaderValue, Response, StatusCode};
use once_cell::sync::Lazy;
use serde_json::json;
use tracing::warn;

use super::handler::{RequestHandler, ResponseBody};
use super::router::{Router, get};
use super::{RequestContext, Site};
use crate::canonical::{self, headers_body, json_response, typed_response};
use crate::morse;
use crate::raw::behaviors::{INCOMPLETE_HTML, INCOMPLETE_JSON, INCOMPLETE_PLAIN, INCOMPLETE_XML};

const DEFAULT_HEADER_SIZE: usize = 63 * 1024;

/// Largest cookie the large-header behavior builds.
const MAX_HEADER_SIZE: usize = 4 * 1024 * 1024;

/// What the too-long behavior puts in `Content-Length`, well past any of its bodies.
const TOO_LONG_DECLARED_LENGTH: u64 = 2300;

const TEXT_MORSE: &str = "text/morse";
const TEXT_CSV: &str = "text/csv";

const UNPARSEABLE_HTML: &str =
    "<!doctype html><html><head><title>Your API is Broken</title></head><body>This should be JSON.</body></html>";
const UNPARSEABLE_CSV: &str = "message,status\nThis is a CSV response that your code almost certainly can't parse";

const MORSE_LETTER: [&str; 6] = [
    "DEAREST ANN",
    "TIMES ARE HARD",
    "MY TREADMILL DESK DOESNT RECLINE ALL THE WAY",
    "THE KITCHEN HASNT HAD SOYLENT FOR TWO WHOLE DAYS",
    "HOW IS ANYONE SUPPOSED TO PROGRAM IN THESE CONDITIONS",
    "PLEASE SEND HELP",
];

static MORSE_BODY: Lazy<Bytes> = Lazy::new(|| {
    let letter = MORSE_LETTER.join(" STOP ") + " STOP";
    Bytes::from(morse::encode(&letter))
});

fn site(handler: impl RequestHandler + 'static) -> Result<Site, matchit::InsertError> {
    Router::builder().route("/", get(handler)).build().map(Site::new)
}

pub fn sleep_site(default: Duration) -> Result<Site, matchit::InsertError> {
    site(Sleep { default })
}

pub fn status_site() -> Result<Site, matchit::InsertError> {
    site(Status)
}

pub fn large_header_site() -> Result<Site, matchit::InsertError> {
    site(LargeHeader)
}

pub fn unparseable_site() -> Result<Site, matchit::InsertError> {
    site(Unparseable)
}

pub fn toolong_site() -> Result<Site, matchit::InsertError> {
    site(TooLong)
}

/// Waits `?sleep=` seconds, then echoes the request headers.
#[derive(Debug, Clone, Copy)]
pub struct Sleep {
    default: Duration,
}

#[async_trait]
impl RequestHandler for Sleep {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let delay = match ctx.param("sleep") {
            None => self.default,
            Some(value) => match value.parse::<f64>().ok().and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
                Some(delay) => delay,
                None => {
                    let body = json!({ "error": "Please pass a number of seconds to sleep", "sleep": value });
                    return json_response(StatusCode::BAD_REQUEST, &body);
                }
            },
        };

        tokio::time::sleep(delay).await;
        json_response(StatusCode::OK, &headers_body(ctx.headers()))
    }
}

/// Answers with the `?status=` code and its canonical body.
#[derive(Debug, Clone, Copy)]
pub struct Status;

#[async_trait]
impl RequestHandler for Status {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let Some(value) = ctx.param("status") else {
            return canonical::status_response(StatusCode::OK);
        };

        match value.parse::<u16>().ok().and_then(|code| StatusCode::from_u16(code).ok()) {
            Some(status) => canonical::status_response(status),
            None => {
                let body = json!({ "error": "Please pass a status code between 100 and 999", "status": value });
                json_response(StatusCode::BAD_REQUEST, &body)
            }
        }
    }
}

/// Sends a `Cookie` header of `?size=` bytes.
#[derive(Debug, Clone, Copy)]
pub struct LargeHeader;

#[async_trait]
impl RequestHandler for LargeHeader {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let size = match ctx.param("size") {
            None => DEFAULT_HEADER_SIZE,
            Some(value) => match value.parse::<usize>() {
                Ok(size) if size <= MAX_HEADER_SIZE => size,
                _ => {
                    let body = json!({
                        "error": format!("Please pass an integer header size of at most {MAX_HEADER_SIZE} bytes"),
                        "size": value,
                    });
                    return json_response(StatusCode::BAD_REQUEST, &body);
                }
            },
        };

        let cookie = match HeaderValue::from_bytes(&vec![b'a'; size]) {
            Ok(cookie) => cookie,
            Err(e) => {
                warn!(cause = %e, size, "can't build cookie header");
                return canonical::status_response(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let mut response = json_response(StatusCode::OK, &headers_body(ctx.headers()));
        response.headers_mut().insert(COOKIE, cookie);
        response
    }
}

/// Answers in a content type the client did not ask for.
#[derive(Debug, Clone, Copy)]
pub struct Unparseable;

#[async_trait]
impl RequestHandler for Unparseable {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let accept = ctx.accept();

        if !accept.contains(TEXT_MORSE) {
            return morse_response();
        }

        if !accept.accept_json() {
            let body = json!({ "status": 200, "message": "This is a JSON response. You did not ask for JSON data." });
            return json_response(StatusCode::OK, &body);
        }

        if !accept.accept_html() {
            return typed_response("text/html", UNPARSEABLE_HTML);
        }

        if !accept.contains(TEXT_CSV) {
            return typed_response(TEXT_CSV, UNPARSEABLE_CSV);
        }

        morse_response()
    }
}

fn morse_response() -> Response<ResponseBody> {
    typed_response(TEXT_MORSE, MORSE_BODY.clone())
}

/// Declares a `Content-Length` longer than the body it sends.
#[derive(Debug, Clone, Copy)]
pub struct TooLong;

impl TooLong {
    fn negotiate(ctx: &RequestContext) -> (&'static str, &'static str) {
        match ctx.accept().best() {
            Some("text/html") => ("text/html", INCOMPLETE_HTML),
            Some("text/plain") => ("text/plain", INCOMPLETE_PLAIN),
            Some("text/xml" | "application/xml") => ("text/xml", INCOMPLETE_XML),
            _ => ("application/json", INCOMPLETE_JSON),
        }
    }
}

#[async_trait]
impl RequestHandler for TooLong {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let (content_type, body) = Self::negotiate(ctx);

        let mut response = Response::new(ResponseBody::from(body));
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(TOO_LONG_DECLARED_LENGTH));
        response.extensions_mut().insert(DeclaredLength(TOO_LONG_DECLARED_LENGTH));
        response
    }
}

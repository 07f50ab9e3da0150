//! Behaviors that need a parsed request.
//!
//! Each http port is served by a [`Site`]: a small router whose handlers get a
//! [`RequestContext`] and return a complete response. The site stamps the `Server` header on
//! every response and writes the access line.

pub mod accept;
pub mod behaviors;
pub mod context;
pub mod handler;
pub mod retries;
pub mod router;

use std::error::Error;

use async_trait::async_trait;
use bytes::Bytes;
use hamms_http::handler::Handler;
use hamms_http::protocol::{ConnectionInfo, RequestHeader};
use http::header::{ALLOW, CONTENT_TYPE, SERVER};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::Full;
use tracing::warn;

pub use behaviors::{large_header_site, sleep_site, status_site, toolong_site, unparseable_site};
pub use context::RequestContext;
pub use handler::{RequestHandler, ResponseBody};
pub use retries::retries_site;
pub use router::Router;

use crate::{SERVER_HEADER, access_log};
use router::RouteResult;

const NOT_FOUND_BODY: &str = "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
    <title>404 Not Found</title>\n\
    <h1>Not Found</h1>\n\
    <p>The requested URL was not found on the server.  If you entered the URL manually please check your spelling and try again.</p>\n";

const METHOD_NOT_ALLOWED_BODY: &str = "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n\
    <title>405 Method Not Allowed</title>\n\
    <h1>Method Not Allowed</h1>\n\
    <p>The method is not allowed for the requested URL.</p>\n";

/// The http handler behind one behavior port.
#[derive(Debug)]
pub struct Site {
    router: Router,
}

impl Site {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Routes `ctx` and runs the matching handler, without the `Server` header or logging.
    pub async fn dispatch(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        match self.router.at(ctx.uri().path(), ctx.method()) {
            RouteResult::Matched(handler) => handler.invoke(ctx).await,
            RouteResult::MethodNotAllowed(allowed) => method_not_allowed(&allowed),
            RouteResult::NotFound => html_error(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
        }
    }
}

#[async_trait]
impl Handler for Site {
    type RespBody = ResponseBody;
    type Error = Box<dyn Error + Send + Sync>;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Self::RespBody>, Self::Error> {
        let (parts, body) = req.into_parts();
        let info = parts.extensions.get::<ConnectionInfo>().copied().unwrap_or_default();
        let ctx = RequestContext::new(RequestHeader::from(parts), body, info);

        let mut response = self.dispatch(&ctx).await;
        response.headers_mut().insert(SERVER, HeaderValue::from_static(SERVER_HEADER));

        access_log::http(info, ctx.method(), ctx.full_path(), response.status(), ctx.user_agent());
        Ok(response)
    }
}

fn html_error(status: StatusCode, body: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(Full::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
    response
}

fn method_not_allowed(allowed: &[Method]) -> Response<ResponseBody> {
    let mut response = html_error(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY);

    let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    match HeaderValue::from_str(&allow) {
        Ok(value) => {
            response.headers_mut().insert(ALLOW, value);
        }
        Err(e) => warn!(cause = %e, allow, "can't build allow header"),
    }
    response
}

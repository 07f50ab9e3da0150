use async_trait::async_trait;
use bytes::Bytes;
use http::Response;
use http_body_util::Full;

use super::RequestContext;

/// Body type of every http behavior response.
pub type ResponseBody = Full<Bytes>;

/// Produces the response for one routed request.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody>;
}

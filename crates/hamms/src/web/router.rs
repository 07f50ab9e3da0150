//! Path and method routing for the http behaviors.
//!
//! Paths are matched with `matchit`; every path holds a list of items, the first item whose
//! method filter accepts the request handles it.

use std::collections::HashMap;
use std::fmt;

use http::Method;
use tracing::trace;

use super::handler::RequestHandler;

type InnerRouter<T> = matchit::Router<T>;

pub struct Router {
    inner_router: InnerRouter<Vec<RouterItem>>,
}

/// A method filter and the handler it guards.
pub struct RouterItem {
    filter: MethodFilter,
    handler: Box<dyn RequestHandler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(expected) => expected == method,
        }
    }
}

/// Outcome of routing a request.
pub enum RouteResult<'router> {
    Matched(&'router dyn RequestHandler),
    /// The path exists but no item accepts the method; carries the methods that would.
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn at(&self, path: &str, method: &Method) -> RouteResult<'_> {
        let items = match self.inner_router.at(path) {
            Ok(matched) => matched.value,
            Err(e) => {
                trace!(path, cause = %e, "no route");
                return RouteResult::NotFound;
            }
        };

        match items.iter().find(|item| item.filter.matches(method)) {
            Some(item) => RouteResult::Matched(item.handler.as_ref()),
            None => RouteResult::MethodNotAllowed(
                items
                    .iter()
                    .filter_map(|item| match &item.filter {
                        MethodFilter::Only(method) => Some(method.clone()),
                        MethodFilter::Any => None,
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").finish_non_exhaustive()
    }
}

impl fmt::Debug for RouterItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterItem").field("filter", &self.filter).finish_non_exhaustive()
    }
}

impl fmt::Debug for RouteResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteResult::Matched(_) => f.write_str("Matched"),
            RouteResult::MethodNotAllowed(allowed) => f.debug_tuple("MethodNotAllowed").field(allowed).finish(),
            RouteResult::NotFound => f.write_str("NotFound"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RouterBuilder {
    data: HashMap<String, Vec<RouterItem>>,
}

impl RouterBuilder {
    fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: impl Into<String>, item: RouterItem) -> Self {
        self.data.entry(route.into()).or_default().push(item);
        self
    }

    pub fn build(self) -> Result<Router, matchit::InsertError> {
        let mut inner_router = InnerRouter::new();
        for (path, items) in self.data {
            inner_router.insert(path, items)?;
        }
        Ok(Router { inner_router })
    }
}

/// Routes every method to `handler`.
pub fn any<H: RequestHandler + 'static>(handler: H) -> RouterItem {
    RouterItem { filter: MethodFilter::Any, handler: Box::new(handler) }
}

macro_rules! method_router {
    ($method:ident, $upper_case_method:ident) => {
        #[doc = concat!("Routes HTTP ", stringify!($upper_case_method), " requests to `handler`.")]
        pub fn $method<H: RequestHandler + 'static>(handler: H) -> RouterItem {
            RouterItem { filter: MethodFilter::Only(Method::$upper_case_method), handler: Box::new(handler) }
        }
    };
}

method_router!(get, GET);
method_router!(post, POST);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::RequestContext;
    use crate::web::handler::ResponseBody;
    use async_trait::async_trait;
    use http::Response;

    struct Named(&'static str);

    #[async_trait]
    impl RequestHandler for Named {
        async fn invoke(&self, _ctx: &RequestContext) -> Response<ResponseBody> {
            Response::new(ResponseBody::from(self.0))
        }
    }

    fn router() -> Router {
        Router::builder()
            .route("/", any(Named("index")))
            .route("/counters", post(Named("reset")))
            .route("/counters", get(Named("list")))
            .build()
            .unwrap()
    }

    #[test]
    fn any_method() {
        let router = router();
        for method in [Method::GET, Method::DELETE, Method::PATCH] {
            assert!(matches!(router.at("/", &method), RouteResult::Matched(_)));
        }
    }

    #[test]
    fn method_filters() {
        let router = router();
        assert!(matches!(router.at("/counters", &Method::GET), RouteResult::Matched(_)));
        assert!(matches!(router.at("/counters", &Method::POST), RouteResult::Matched(_)));

        match router.at("/counters", &Method::PUT) {
            RouteResult::MethodNotAllowed(mut allowed) => {
                allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
                assert_eq!(allowed, vec![Method::GET, Method::POST]);
            }
            other => panic!("expected method not allowed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_path() {
        assert!(matches!(router().at("/redirect/1", &Method::GET), RouteResult::NotFound));
    }

    #[test]
    fn conflicting_routes_fail_to_build() {
        let result = Router::builder().route("/{a}", get(Named("a"))).route("/{b}", get(Named("b"))).build();
        assert!(result.is_err());
    }
}

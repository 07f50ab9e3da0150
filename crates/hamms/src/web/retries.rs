//! Fails a configurable number of times per key before succeeding.
//!
//! `/` consumes one try of `?key=`; `/counters` lets a test inspect the counters (`GET`) or set
//! one up front (`POST`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use http::{Response, StatusCode};
use serde::Serialize;

use super::handler::{RequestHandler, ResponseBody};
use super::router::{Router, any, get, post};
use super::{RequestContext, Site};
use crate::canonical::json_response;
use crate::retry_store::RetryStore;

const DEFAULT_KEY: &str = "default";
const DEFAULT_TRIES: i64 = 3;

pub fn retries_site(store: RetryStore) -> Result<Site, matchit::InsertError> {
    Router::builder()
        .route("/", any(Retries { store: store.clone() }))
        .route("/counters", post(ResetCounter { store: store.clone() }))
        .route("/counters", get(ListCounters { store }))
        .build()
        .map(Site::new)
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    error: String,
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tries_remaining: Option<i64>,
    success: bool,
}

impl<'a> Failure<'a> {
    fn bad_tries(key: &'a str, error: &str) -> Self {
        Self { error: error.to_owned(), key, tries_remaining: None, success: false }
    }

    fn try_again(key: &'a str, tries_remaining: i64) -> Self {
        let times = if tries_remaining == 1 { "time" } else { "times" };
        Self {
            error: format!("The server had an error. Try again {tries_remaining} more {times}"),
            key,
            tries_remaining: Some(tries_remaining),
            success: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct Success<'a> {
    key: &'a str,
    tries_remaining: i64,
    success: bool,
}

impl<'a> Success<'a> {
    fn new(key: &'a str, tries_remaining: i64) -> Self {
        Self { key, tries_remaining, success: true }
    }
}

#[derive(Debug, Serialize)]
struct Counters {
    counters: BTreeMap<String, i64>,
    success: bool,
}

fn key(ctx: &RequestContext) -> String {
    ctx.param("key").unwrap_or_else(|| DEFAULT_KEY.to_owned())
}

/// `?tries=`, or `default` when missing. `None` when it is not an integer of at least `min`.
fn tries(ctx: &RequestContext, default: i64, min: i64) -> Option<i64> {
    match ctx.param("tries") {
        None => Some(default),
        Some(value) => value.trim().parse::<i64>().ok().filter(|tries| *tries >= min),
    }
}

struct Retries {
    store: RetryStore,
}

#[async_trait]
impl RequestHandler for Retries {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let key = key(ctx);
        let Some(tries) = tries(ctx, DEFAULT_TRIES, 1) else {
            let failure = Failure::bad_tries(&key, "Please pass an integer number of tries");
            return json_response(StatusCode::BAD_REQUEST, &failure);
        };

        match self.store.consume(&key, tries) {
            remaining if remaining > 0 => {
                json_response(StatusCode::INTERNAL_SERVER_ERROR, &Failure::try_again(&key, remaining))
            }
            remaining => json_response(StatusCode::OK, &Success::new(&key, remaining)),
        }
    }
}

struct ResetCounter {
    store: RetryStore,
}

#[async_trait]
impl RequestHandler for ResetCounter {
    async fn invoke(&self, ctx: &RequestContext) -> Response<ResponseBody> {
        let key = key(ctx);
        let Some(tries) = tries(ctx, DEFAULT_TRIES, 0) else {
            let failure = Failure::bad_tries(&key, "Please pass a non-negative integer number of tries");
            return json_response(StatusCode::BAD_REQUEST, &failure);
        };

        self.store.reset(&key, tries);
        json_response(StatusCode::OK, &Success::new(&key, tries))
    }
}

struct ListCounters {
    store: RetryStore,
}

#[async_trait]
impl RequestHandler for ListCounters {
    async fn invoke(&self, _ctx: &RequestContext) -> Response<ResponseBody> {
        json_response(StatusCode::OK, &Counters { counters: self.store.snapshot(), success: true })
    }
}

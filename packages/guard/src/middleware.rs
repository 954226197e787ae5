//! Axum middleware for REST endpoints
//!
//! ```ignore
//! let login = BucketLimit::new(limiter.clone(), AUTH_BUCKET).trust_proxy(true);
//! let app = Router::new()
//!     .route("/login", post(login_handler))
//!     .layer(axum::middleware::from_fn_with_state(login, rate_limit));
//! ```

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::context::RequestContext;
use crate::rate_limit::{RateLimitDecision, RateLimiter};

/// Middleware state: which bucket a route counts against
#[derive(Clone)]
pub struct BucketLimit {
    limiter: RateLimiter,
    bucket: String,
    trust_proxy: bool,
}

impl BucketLimit {
    pub fn new(limiter: RateLimiter, bucket: impl Into<String>) -> Self {
        Self {
            limiter,
            bucket: bucket.into(),
            trust_proxy: false,
        }
    }

    /// Derive the client address from proxy headers
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }
}

/// Count the request against the configured bucket
///
/// Admitted responses carry `X-RateLimit-Limit`, `X-RateLimit-Remaining`
/// and `X-RateLimit-Reset` (unix seconds). Limited requests get a 429 with
/// `Retry-After`.
pub async fn rate_limit(
    State(state): State<BucketLimit>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ctx = RequestContext::from_request(request.headers(), peer, state.trust_proxy);

    let decision = match state.limiter.check(&state.bucket, &ctx) {
        Ok(decision) => decision,
        Err(err) => return err.into_response(),
    };

    match decision {
        RateLimitDecision::Allowed {
            remaining,
            reset_at,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            if let Some(bucket) = state.limiter.bucket(&state.bucket) {
                headers.insert("X-RateLimit-Limit", HeaderValue::from(bucket.max));
            }
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at.timestamp()));
            response
        }
        RateLimitDecision::Limited {
            retry_after_secs, ..
        } => state
            .limiter
            .rejection(&state.bucket, retry_after_secs)
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Router};
    use tower::ServiceExt;
    use turnstile_shared_config::RateLimitSettings;

    use super::*;
    use crate::clock::SystemClock;
    use crate::hasher::IdentifierHasher;
    use crate::rate_limit::AUTH_BUCKET;
    use crate::store::InMemoryCounterStore;

    fn app() -> Router {
        let limiter = RateLimiter::with_defaults(
            &RateLimitSettings::default(),
            Arc::new(InMemoryCounterStore::new()),
            IdentifierHasher::new(),
            Arc::new(SystemClock),
        );
        let state = BucketLimit::new(limiter, AUTH_BUCKET).trust_proxy(true);

        Router::new()
            .route("/login", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(state, rate_limit))
    }

    fn login_from(ip: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/login")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_admitted_response_has_rate_limit_headers() {
        let response = app().oneshot(login_from("203.0.113.5")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn test_sixth_request_gets_429_with_retry_after() {
        let app = app();

        for _ in 0..5 {
            let response = app.clone().oneshot(login_from("203.0.113.5")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(login_from("203.0.113.5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        let other = app.oneshot(login_from("198.51.100.7")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }
}

//! Hand-rolled tier-quota rate limiter (spec §4.13).
//!
//! The teacher's own rate-limit file
//! (`examples/fourthplaces-mntogether/packages/server/src/server/middleware/rate_limit.rs`)
//! is an empty stub — the teacher's real rate limiting lives inline in
//! `app.rs` via `tower_governor::GovernorLayer`, a flat per-second/burst
//! limiter keyed by IP alone. That doesn't fit here: this spec gates by
//! *tier*, not IP, and requires `X-RateLimit-*`/`Retry-After` response
//! headers `tower_governor` doesn't surface. So this is implemented
//! directly as a `tower::Layer`/`Service`, following the shape of the
//! teacher's `GovernorLayer` sibling but reading the [`Tier`] the auth
//! middleware already resolved instead of re-deriving identity from the
//! request itself.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use dashmap::DashMap;
use tower::{Layer, Service};

use crate::auth::{PresentedApiKey, Tier};
use crate::error::ApiError;
use crate::middleware::ip_extractor::ClientIp;

const SECONDS_PER_HOUR: i64 = 3600;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    window_started_at: i64,
}

/// The rate-limit counter map: the only mutable shared state in the query
/// service (spec §5 "shared resources"). Writes are guarded by `DashMap`'s
/// internal sharded locks.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, Bucket>>,
}

enum Outcome {
    Allowed { limit: u32, remaining: u32, reset_at: i64 },
    Limited { limit: u32, reset_at: i64 },
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: Arc::new(DashMap::new()) }
    }

    /// Counters reset at the top of each hour (spec §4.13), not on a
    /// rolling window from first request.
    fn check(&self, key: &str, limit: u32) -> Outcome {
        let now = Utc::now().timestamp();
        let window_started_at = now - (now % SECONDS_PER_HOUR);
        let reset_at = window_started_at + SECONDS_PER_HOUR;

        let mut entry = self.buckets.entry(key.to_string()).or_insert(Bucket { count: 0, window_started_at });
        if entry.window_started_at != window_started_at {
            entry.window_started_at = window_started_at;
            entry.count = 0;
        }

        if entry.count >= limit {
            return Outcome::Limited { limit, reset_at };
        }
        entry.count += 1;
        Outcome::Allowed { limit, remaining: limit - entry.count, reset_at }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: RateLimiter,
}

impl RateLimitLayer {
    pub fn new(limiter: RateLimiter) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService { inner, limiter: self.limiter.clone() }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: RateLimiter,
}

/// The bucket key: `apikey:<key>` when a credential was presented, else
/// `ip:<client_ip>`, else `ip:unknown` (spec §4.13).
fn bucket_key(req: &Request<Body>) -> String {
    if let Some(PresentedApiKey(key)) = req.extensions().get::<PresentedApiKey>() {
        return format!("apikey:{key}");
    }
    match req.extensions().get::<ClientIp>() {
        Some(ClientIp(ip)) => format!("ip:{ip}"),
        None => "ip:unknown".to_string(),
    }
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let tier = req.extensions().get::<Tier>().copied().unwrap_or(Tier::Public);
        let key = bucket_key(&req);
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match limiter.check(&key, tier.requests_per_hour()) {
                Outcome::Allowed { limit, remaining, reset_at } => {
                    let mut response = inner.call(req).await?;
                    insert_rate_limit_headers(&mut response, limit, remaining, reset_at);
                    Ok(response)
                }
                Outcome::Limited { limit, reset_at } => {
                    let retry_after_secs = (reset_at - Utc::now().timestamp()).max(0) as u64;
                    Ok(ApiError::RateLimited { retry_after_secs, limit, reset_at }.into_response())
                }
            }
        })
    }
}

fn insert_rate_limit_headers(response: &mut Response, limit: u32, remaining: u32, reset_at: i64) {
    let headers = response.headers_mut();
    for (name, value) in [
        ("x-ratelimit-limit", limit.to_string()),
        ("x-ratelimit-remaining", remaining.to_string()),
        ("x-ratelimit-reset", reset_at.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_requests_under_the_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(matches!(limiter.check("ip:1.2.3.4", 5), Outcome::Allowed { .. }));
        }
    }

    #[test]
    fn blocks_the_request_past_the_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check("ip:1.2.3.4", 5);
        }
        assert!(matches!(limiter.check("ip:1.2.3.4", 5), Outcome::Limited { .. }));
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check("ip:1.2.3.4", 5);
        }
        assert!(matches!(limiter.check("ip:5.6.7.8", 5), Outcome::Allowed { .. }));
    }
}

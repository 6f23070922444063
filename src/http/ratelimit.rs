//! Per-caller-IP token bucket (spec §6: "rate limiting is applied at the
//! HTTP layer and returns 429 with a `Retry-After` hint"). Deliberately
//! simple - spec.md treats this as a conventional wrapper, not CORE.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request, Response, StatusCode};
use dashmap::DashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

struct Bucket {
    count: u32,
    window_start: Instant,
}

struct Limiter {
    buckets: DashMap<SocketAddr, Bucket>,
    limit: u32,
    window: Duration,
}

impl Limiter {
    fn check(&self, addr: SocketAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(addr).or_insert_with(|| Bucket { count: 0, window_start: now });
        if now.duration_since(bucket.window_start) >= self.window {
            bucket.count = 0;
            bucket.window_start = now;
        }
        if bucket.count >= self.limit {
            return Err(self.window - now.duration_since(bucket.window_start));
        }
        bucket.count += 1;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<Limiter>,
}

impl RateLimitLayer {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        RateLimitLayer {
            limiter: Arc::new(Limiter { buckets: DashMap::new(), limit, window: Duration::from_secs(window_secs) }),
        }
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
    limiter: Arc<Limiter>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let addr = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
        let limiter = self.limiter.clone();
        let mut inner = self.inner.clone();
        Box::pin(async move {
            if let Some(addr) = addr {
                if let Err(retry_after) = limiter.check(addr) {
                    let body = serde_json::json!({"code": "RateLimited", "message": "too many requests"});
                    let mut response = Response::new(Body::from(body.to_string()));
                    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                    if let Ok(value) = retry_after.as_secs().to_string().parse() {
                        response.headers_mut().insert(header::RETRY_AFTER, value);
                    }
                    return Ok(response);
                }
            }
            inner.call(req).await
        })
    }
}

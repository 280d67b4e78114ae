use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Idle buckets are swept once this many clients are tracked.
const PRUNE_THRESHOLD: usize = 10_000;
/// Minimum gap between two sweeps.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);
/// Hard cap; past it the least recently refilled quarter is evicted.
const MAX_TRACKED: usize = 50_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug, Default)]
struct Buckets {
    map: HashMap<String, Bucket>,
    last_prune: Option<Instant>,
}

impl Buckets {
    fn make_room(&mut self, now: Instant, window: Duration) {
        let due = self
            .last_prune
            .is_none_or(|at| now.saturating_duration_since(at) >= PRUNE_INTERVAL);
        if self.map.len() >= PRUNE_THRESHOLD && due {
            self.map
                .retain(|_, b| now.saturating_duration_since(b.last_refill) < window);
            self.last_prune = Some(now);
        }
        if self.map.len() >= MAX_TRACKED {
            self.evict_oldest(MAX_TRACKED / 4);
        }
    }

    fn evict_oldest(&mut self, count: usize) {
        let mut refills: Vec<Instant> = self.map.values().map(|b| b.last_refill).collect();
        if count == 0 || refills.len() < count {
            return;
        }
        let (_, cutoff, _) = refills.select_nth_unstable(count - 1);
        let cutoff = *cutoff;
        self.map.retain(|_, b| b.last_refill > cutoff);
    }
}

/// Token bucket per client key: `max` requests, refilled evenly over `window`.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<Buckets>,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max: u32, window: Duration) -> Self {
        let capacity = f64::from(max.max(1));
        let secs = window.as_secs_f64().max(1.0);
        Self {
            buckets: Mutex::new(Buckets::default()),
            capacity,
            refill_per_sec: capacity / secs,
            window,
        }
    }

    pub async fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now()).await
    }

    async fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().await;
        if !buckets.map.contains_key(key) {
            buckets.make_room(now, self.window);
        }
        let bucket = buckets.map.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + (elapsed * self.refill_per_sec)).min(self.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// First `x-forwarded-for` hop, else the peer address, else a shared key.
fn client_key(request: &Request<Body>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_owned(), |ConnectInfo(addr)| addr.ip().to_string())
}

pub(crate) async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if !state.limiter.allow(&key).await {
        warn!(client = %key, route = %request.uri().path(), "rate limit exceeded");
        return ApiError::TooManyRequests.into_response();
    }
    next.run(request).await
}

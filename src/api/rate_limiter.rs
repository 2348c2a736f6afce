//! Per-client rate limiting for the AI relay endpoints. The relay calls a
//! metered upstream, so these routes get a fixed per-minute window while the
//! rest of the API stays unthrottled.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::api::dto::ErrorResponse;

const WINDOW: Duration = Duration::from_secs(60);

/// Fixed-window counter keyed by client IP.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    windows: Arc<RwLock<HashMap<IpAddr, (u32, Instant)>>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            max_requests: requests_per_minute,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn allow(&self, ip: IpAddr) -> bool {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        match windows.get_mut(&ip) {
            Some((count, start)) => {
                if now.duration_since(*start) > WINDOW {
                    *count = 1;
                    *start = now;
                    true
                } else if *count < self.max_requests {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
            None => {
                windows.insert(ip, (1, now));
                true
            }
        }
    }

    /// Drop windows that have already elapsed.
    pub async fn cleanup_expired(&self) {
        let mut windows = self.windows.write().await;
        let now = Instant::now();
        windows.retain(|_, (_, start)| now.duration_since(*start) <= WINDOW);
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));

    if limiter.allow(ip).await {
        next.run(request).await
    } else {
        tracing::warn!("Rate limit exceeded for {}", ip);
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new(
                "Too many requests. Please try again later.",
            )),
        )
            .into_response()
    }
}

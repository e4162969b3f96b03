// SPDX-License-Identifier: MIT

//! Guardrails middleware (§4.12): optional bearer-token auth, a per-IP
//! sliding-window rate limit, a content-type check on mutating requests,
//! and an allowed-origin check for browser-originating requests. Each is a
//! small `axum::middleware::from_fn_with_state` layer rather than a tower
//! `Service` impl, matching the weight of the checks involved.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

const RATE_LIMIT_PER_MINUTE: usize = 60;

/// Sliding-window request timestamps keyed by client IP. Old entries are
/// pruned lazily on the next request from the same IP rather than by a
/// background sweep, since idle IPs cost nothing to leave stale.
#[derive(Default)]
pub struct RateLimiter {
    hits: Mutex<HashMap<IpAddr, Vec<chrono::DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let window_start = now - chrono::Duration::minutes(1);
        let mut hits = self.hits.lock();
        let entry = hits.entry(ip).or_default();
        entry.retain(|at| *at > window_start);
        if entry.len() >= RATE_LIMIT_PER_MINUTE {
            return false;
        }
        entry.push(now);
        true
    }
}

fn client_ip(headers: &HeaderMap, fallback: Option<IpAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or(fallback)
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

pub async fn rate_limit(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let ip = client_ip(request.headers(), None);
    if state.rate_limiter.check(ip) {
        next.run(request).await
    } else {
        ApiError::RateLimited.into_response()
    }
}

pub async fn bearer_auth(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let Some(expected) = state.bearer_token.as_ref() else {
        return next.run(request).await;
    };
    let provided = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if provided == Some(expected.as_str()) {
        next.run(request).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}

/// Multipart uploads must be declared as such; every other mutating request
/// must declare JSON. GET/HEAD requests carry no body and are exempt.
pub async fn content_type_guard(request: Request<Body>, next: Next) -> Response {
    if matches!(request.method(), &Method::GET | &Method::HEAD) {
        return next.run(request).await;
    }
    let content_type = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let is_upload = request.uri().path() == "/runs";
    let ok = if is_upload {
        content_type.starts_with("multipart/form-data")
    } else {
        content_type.starts_with("application/json")
    };
    if ok {
        next.run(request).await
    } else {
        ApiError::BadRequest(format!("unexpected content-type: {content_type}")).into_response()
    }
}

pub async fn origin_guard(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let Some(allowed) = state.allowed_origin.as_ref() else {
        return next.run(request).await;
    };
    let origin = request
        .headers()
        .get(axum::http::header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    match origin {
        None => next.run(request).await,
        Some(origin) if origin == allowed => next.run(request).await,
        Some(_) => ApiError::Unauthorized.into_response(),
    }
}

pub fn deprecation_headers() -> [(&'static str, &'static str); 1] {
    [("deprecation", "true")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_blocks_after_threshold() {
        let limiter = RateLimiter::default();
        let ip = IpAddr::from([10, 0, 0, 1]);
        for _ in 0..RATE_LIMIT_PER_MINUTE {
            assert!(limiter.check(ip));
        }
        assert!(!limiter.check(ip));
    }

    #[test]
    fn rate_limiter_tracks_ips_independently() {
        let limiter = RateLimiter::default();
        let a = IpAddr::from([10, 0, 0, 1]);
        let b = IpAddr::from([10, 0, 0, 2]);
        for _ in 0..RATE_LIMIT_PER_MINUTE {
            assert!(limiter.check(a));
        }
        assert!(limiter.check(b));
    }
}

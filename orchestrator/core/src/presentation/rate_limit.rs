// Copyright (c) 2026 Quill Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Per-client-IP rate limiting for the HTTP API.
//!
//! Fixed windows: each client gets `max_requests` calls, counted from its first
//! request, and the count starts over once `window` has elapsed.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use tracing::{debug, warn};

use super::api::ErrorResponse;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Expired client windows are pruned once every this many checks
const PRUNE_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started: Instant,
    count: u32,
}

/// Allows at most `max_requests` per client IP in each `window`
pub struct IpRateLimiter {
    max_requests: u32,
    window: Duration,
    clients: DashMap<IpAddr, ClientWindow>,
    checks: AtomicU64,
}

impl IpRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> anyhow::Result<Self> {
        if max_requests == 0 {
            anyhow::bail!("rate limit max_requests must be positive");
        }
        if window.is_zero() {
            anyhow::bail!("rate limit window must be positive");
        }

        Ok(Self {
            max_requests,
            window,
            clients: DashMap::new(),
            checks: AtomicU64::new(0),
        })
    }

    /// Record one request from `ip`; false when over the limit
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    /// [`IpRateLimiter::check`] against an explicit clock reading
    pub fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune_at(now);
        }

        let mut entry = self.clients.entry(ip).or_insert(ClientWindow {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }

    /// Drop clients whose window has expired
    pub fn prune_at(&self, now: Instant) {
        let before = self.clients.len();
        self.clients
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        debug!(
            pruned = before.saturating_sub(self.clients.len()),
            "Pruned rate limit state"
        );
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Middleware rejecting clients over their quota with a JSON 429.
///
/// The peer address comes from `ConnectInfo`; when the server was not started
/// with connect info every request shares one bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<IpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(ip) {
        warn!(client = %ip, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new(RATE_LIMIT_MESSAGE)),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = IpRateLimiter::new(3, Duration::from_secs(900)).unwrap();
        let client = ip("10.0.0.1");

        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(!limiter.check(client));
    }

    #[test]
    fn test_steady_traffic_never_exceeds_window_quota() {
        let limiter = IpRateLimiter::new(4, Duration::from_secs(2)).unwrap();
        let client = ip("10.0.0.1");
        let start = Instant::now();

        // One request every 10ms for 1.9s
        let allowed = (0u64..190)
            .filter(|&i| limiter.check_at(client, start + Duration::from_millis(10 * i)))
            .count();

        assert_eq!(allowed, 4);
    }

    #[test]
    fn test_quota_restores_after_window() {
        let limiter = IpRateLimiter::new(2, Duration::from_secs(60)).unwrap();
        let client = ip("10.0.0.1");
        let start = Instant::now();

        assert!(limiter.check_at(client, start));
        assert!(limiter.check_at(client, start + Duration::from_secs(1)));
        assert!(!limiter.check_at(client, start + Duration::from_secs(59)));

        let next_window = start + Duration::from_secs(60);
        assert!(limiter.check_at(client, next_window));
        assert!(limiter.check_at(client, next_window + Duration::from_secs(30)));
        assert!(!limiter.check_at(client, next_window + Duration::from_secs(59)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = IpRateLimiter::new(1, Duration::from_secs(60)).unwrap();
        let first = ip("10.0.0.1");
        let second = ip("10.0.0.2");

        assert!(limiter.check(first));
        assert!(!limiter.check(first));
        assert!(limiter.check(second));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_prune_drops_expired_windows() {
        let limiter = IpRateLimiter::new(5, Duration::from_secs(10)).unwrap();
        let start = Instant::now();

        limiter.check_at(ip("10.0.0.1"), start);
        limiter.check_at(ip("10.0.0.2"), start + Duration::from_secs(8));

        limiter.prune_at(start + Duration::from_secs(12));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        assert!(IpRateLimiter::new(0, Duration::from_secs(60)).is_err());
        assert!(IpRateLimiter::new(10, Duration::ZERO).is_err());
    }
}

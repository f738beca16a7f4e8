use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use crate::error::ApiError;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl Window {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            count: 0,
        }
    }

    fn roll(&mut self, now: Instant, span: Duration) {
        if now.duration_since(self.started) >= span {
            *self = Self::new(now);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Quota {
    minute: Window,
    hour: Window,
    day: Window,
}

/// Fixed-window request quota per client address.
#[derive(Debug)]
pub struct RateLimiter {
    limits: RateLimitConfig,
    clients: DashMap<IpAddr, Quota>,
}

impl RateLimiter {
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            limits,
            clients: DashMap::new(),
        }
    }

    /// Counts a request from `ip`; `false` once any window is exhausted.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut entry = self.clients.entry(ip).or_insert_with(|| Quota {
            minute: Window::new(now),
            hour: Window::new(now),
            day: Window::new(now),
        });
        let quota = entry.value_mut();

        let mut windows = [
            (&mut quota.minute, MINUTE, self.limits.per_minute),
            (&mut quota.hour, HOUR, self.limits.per_hour),
            (&mut quota.day, DAY, self.limits.per_day),
        ];
        for (window, span, _) in windows.iter_mut() {
            window.roll(now, *span);
        }
        if windows
            .iter()
            .any(|(window, _, limit)| *limit > 0 && window.count >= *limit)
        {
            return false;
        }
        for (window, _, limit) in windows.iter_mut() {
            if *limit > 0 {
                window.count += 1;
            }
        }
        true
    }

    /// Drops clients whose day window has lapsed.
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        self.clients
            .retain(|_, quota| now.duration_since(quota.day.started) < DAY);
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(ip) {
        tracing::warn!(client = %ip, "Rate limit exceeded");
        metrics::counter!("ddc_rate_limited_total").increment(1);
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, per_hour: u32, per_day: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            per_minute,
            per_hour,
            per_day,
        })
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const OTHER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn minute_window_rejects_and_resets() {
        let limiter = limiter(2, 0, 0);
        let start = Instant::now();

        assert!(limiter.check_at(CLIENT, start));
        assert!(limiter.check_at(CLIENT, start + Duration::from_secs(1)));
        assert!(!limiter.check_at(CLIENT, start + Duration::from_secs(2)));
        assert!(limiter.check_at(OTHER, start + Duration::from_secs(2)));
        assert!(limiter.check_at(CLIENT, start + MINUTE));
    }

    #[test]
    fn rejected_requests_do_not_consume_quota() {
        let limiter = limiter(1, 2, 0);
        let start = Instant::now();

        assert!(limiter.check_at(CLIENT, start));
        for _ in 0..5 {
            assert!(!limiter.check_at(CLIENT, start));
        }
        assert!(limiter.check_at(CLIENT, start + MINUTE));
        assert!(!limiter.check_at(CLIENT, start + MINUTE * 2));
        assert!(limiter.check_at(CLIENT, start + HOUR));
    }

    #[test]
    fn day_window_applies_across_hours() {
        let limiter = limiter(0, 0, 3);
        let start = Instant::now();

        for hour in 0..3 {
            assert!(limiter.check_at(CLIENT, start + HOUR * hour));
        }
        assert!(!limiter.check_at(CLIENT, start + HOUR * 5));
        assert!(limiter.check_at(CLIENT, start + DAY));
    }

    #[test]
    fn zero_limits_disable_throttling() {
        let limiter = limiter(0, 0, 0);
        let now = Instant::now();
        assert!((0..1000).all(|_| limiter.check_at(CLIENT, now)));
    }

    #[test]
    fn disabled_windows_do_not_count() {
        let limiter = limiter(0, 2, 0);
        let now = Instant::now();
        assert!(limiter.check_at(CLIENT, now));
        assert!(limiter.check_at(CLIENT, now));
        assert!(!limiter.check_at(CLIENT, now));

        let quota = *limiter.clients.get(&CLIENT).unwrap();
        assert_eq!(quota.minute.count, 0);
        assert_eq!(quota.hour.count, 2);
        assert_eq!(quota.day.count, 0);
    }

    #[test]
    fn prune_forgets_idle_clients() {
        let limiter = limiter(10, 50, 200);
        let start = Instant::now();
        limiter.check_at(CLIENT, start);
        limiter.check_at(OTHER, start + HOUR);

        limiter.prune_at(start + DAY);
        assert_eq!(limiter.tracked_clients(), 1);
    }
}

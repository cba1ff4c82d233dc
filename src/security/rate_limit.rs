//! Login rate limiting: the one rate-limited surface this core owns (the
//! connection-flood and message-flood limiters the teacher ships are IRC
//! gateway concerns with no counterpart here).
//!
//! Uses the `governor` crate's token bucket algorithm, keyed per source IP.

use std::net::IpAddr;
use std::num::NonZeroU32;

use dashmap::DashMap;
use governor::{Quota, RateLimiter as GovRateLimiter};
use tracing::debug;

use crate::config::SecurityConfig;

type DirectRateLimiter = governor::DefaultDirectRateLimiter;

/// Per-IP login attempt limiter, configured from [`SecurityConfig`].
pub struct LoginRateLimiter {
    limiters: DashMap<IpAddr, DirectRateLimiter>,
    rate_per_minute: u32,
}

impl LoginRateLimiter {
    pub fn new(config: &SecurityConfig) -> Self {
        Self { limiters: DashMap::new(), rate_per_minute: config.login_rate_per_minute.max(1) }
    }

    /// Returns `true` if `ip` may attempt another login right now.
    pub fn check(&self, ip: IpAddr) -> bool {
        let limiter = self
            .limiters
            .entry(ip)
            .or_insert_with(|| GovRateLimiter::direct(Quota::per_minute(NonZeroU32::new(self.rate_per_minute).unwrap())));
        let allowed = limiter.check().is_ok();
        if !allowed {
            debug!(%ip, "login rate limit exceeded");
        }
        allowed
    }

    /// Bounds memory under a sustained flood of distinct source IPs.
    pub fn cleanup(&self) {
        const MAX_ENTRIES: usize = 10_000;
        if self.limiters.len() > MAX_ENTRIES {
            self.limiters.clear();
            debug!("cleared login rate limiters (exceeded {} entries)", MAX_ENTRIES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(rate: u32) -> SecurityConfig {
        SecurityConfig { ci_trigger_key: None, login_rate_per_minute: rate }
    }

    #[test]
    fn allows_up_to_configured_rate_then_blocks() {
        let limiter = LoginRateLimiter::new(&test_config(2));
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));
    }

    #[test]
    fn different_ips_are_independent() {
        let limiter = LoginRateLimiter::new(&test_config(1));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }
}

//! Fixed-window rate limiting keyed by client identity
//!
//! Windows have hard boundaries: a burst straddling an edge can briefly
//! exceed the nominal rate. Known approximation, accepted.

use crate::account::types::current_timestamp;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    RateLimited,
}

pub struct RateLimiter {
    window_ms: u64,
    ceiling: u32,
    windows: Mutex<HashMap<(String, u64), u32>>,
}

impl RateLimiter {
    pub fn new(window_secs: u64, ceiling: u32) -> Self {
        Self {
            window_ms: window_secs.max(1) * 1000,
            ceiling,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        self.admit_at(client_key, current_timestamp())
    }

    fn admit_at(&self, client_key: &str, now_ms: u64) -> Admission {
        let current = now_ms / self.window_ms;
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            // A poisoned limiter fails open rather than locking everyone out
            Err(_) => return Admission::Admitted,
        };

        // Lazy purge: expired windows drop out on the next admission check
        windows.retain(|(_, window), _| *window == current);

        let count = windows
            .entry((client_key.to_string(), current))
            .or_insert(0);
        if *count >= self.ceiling {
            return Admission::RateLimited;
        }
        *count += 1;
        Admission::Admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_enforced() {
        let limiter = RateLimiter::new(60, 3);
        let t = 1_000_000;
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::RateLimited);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(60, 1);
        let t = 1_000_000;
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("5.6.7.8", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::RateLimited);
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = RateLimiter::new(60, 1);
        let t = 1_000_000;
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::Admitted);
        assert_eq!(limiter.admit_at("1.2.3.4", t), Admission::RateLimited);
        // Next window, counter starts over
        assert_eq!(limiter.admit_at("1.2.3.4", t + 60_000), Admission::Admitted);
    }

    #[test]
    fn test_expired_windows_purged() {
        let limiter = RateLimiter::new(60, 5);
        limiter.admit_at("old-client", 1_000_000);
        limiter.admit_at("new-client", 2_000_000);
        let windows = limiter.windows.lock().unwrap();
        assert_eq!(windows.len(), 1);
        assert!(windows.keys().all(|(key, _)| key == "new-client"));
    }
}

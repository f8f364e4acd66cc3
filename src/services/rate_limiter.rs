//! Sliding-window rate limiters
//!
//! `SlidingWindow` keeps the timestamps of recent hits per key and refuses a
//! key once `limit` hits fall inside `window`. It backs:
//! - login attempts (5 failures per email per 15 minutes, 10 requests per
//!   IP per minute)
//! - public inquiry submissions per IP
//! - chat messages relayed per chat session

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Per-key hit counter over a moving time window
pub struct SlidingWindow<K> {
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
    limit: usize,
    window: Duration,
}

impl<K> SlidingWindow<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            hits: RwLock::new(HashMap::new()),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether `key` already used up its window
    pub async fn is_limited(&self, key: &K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    pub async fn record(&self, key: K) {
        let mut hits = self.hits.write().await;
        hits.entry(key).or_default().push(Utc::now());
    }

    /// Check and record in one step. Returns `false` when the key is limited,
    /// in which case nothing is recorded.
    pub async fn try_acquire(&self, key: K) -> bool {
        let now = Utc::now();
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        let times = hits.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= self.limit {
            return false;
        }
        times.push(now);
        true
    }

    pub async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired timestamps and empty keys
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Login protection: failed attempts per email and raw requests per IP
pub struct LoginRateLimiter {
    email_attempts: SlidingWindow<String>,
    ip_requests: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            email_attempts: SlidingWindow::new(5, Duration::minutes(15)),
            ip_requests: SlidingWindow::new(10, Duration::minutes(1)),
        }
    }

    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.email_attempts.is_limited(&email.trim().to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.email_attempts.record(email.trim().to_lowercase()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.email_attempts.clear(&email.trim().to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ip_requests.is_limited(&ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ip_requests.record(ip).await;
    }

    pub async fn cleanup(&self) {
        self.email_attempts.cleanup().await;
        self.ip_requests.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_email_limited("ana@viajes.mx").await);
            limiter.record_failed_attempt("ana@viajes.mx").await;
        }
        limiter.record_failed_attempt("ana@viajes.mx").await;
        assert!(limiter.is_email_limited("ana@viajes.mx").await);

        limiter.clear_email_attempts("ana@viajes.mx").await;
        assert!(!limiter.is_email_limited("ana@viajes.mx").await);
    }

    #[tokio::test]
    async fn test_email_is_case_insensitive() {
        let limiter = LoginRateLimiter::new();
        for email in ["Ana@Viajes.mx", "ana@viajes.mx", " ANA@VIAJES.MX", "ana@viajes.MX", "ana@VIAJES.mx"] {
            limiter.record_failed_attempt(email).await;
        }
        assert!(limiter.is_email_limited("ana@viajes.mx").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("10.0.0.7").unwrap();

        for _ in 0..9 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        limiter.record_ip_request(ip).await;
        assert!(limiter.is_ip_limited(ip).await);

        let other = IpAddr::from_str("10.0.0.8").unwrap();
        assert!(!limiter.is_ip_limited(other).await);
    }

    #[tokio::test]
    async fn test_try_acquire_stops_at_limit() {
        let window = SlidingWindow::new(3, Duration::minutes(1));
        assert!(window.try_acquire("chat_1").await);
        assert!(window.try_acquire("chat_1").await);
        assert!(window.try_acquire("chat_1").await);
        assert!(!window.try_acquire("chat_1").await);
        assert!(window.try_acquire("chat_2").await);
    }

    #[tokio::test]
    async fn test_window_expires() {
        let window = SlidingWindow::new(1, Duration::milliseconds(30));
        assert!(window.try_acquire(1u8).await);
        assert!(!window.try_acquire(1u8).await);

        tokio::time::sleep(std::time::Duration::from_millis(60)).await;
        assert!(window.try_acquire(1u8).await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_keys() {
        let window = SlidingWindow::new(5, Duration::milliseconds(20));
        window.record("a".to_string()).await;
        window.record("b".to_string()).await;
        assert_eq!(window.tracked_keys().await, 2);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        window.cleanup().await;
        assert_eq!(window.tracked_keys().await, 0);
    }
}

//! Fixed-window rate limiting.
//!
//! Counters live in the store (`INCR` + `EXPIRE` on first hit), not in
//! process memory, so limits hold across horizontally scaled bot processes.
//! One minute windows for every gated operation.

use crate::Uid;
use crate::config::LimitsConfig;
use crate::store::{Store, StoreError, keys};
use std::time::Duration;
use tracing::debug;

/// Window length for every limited operation.
const WINDOW: Duration = Duration::from_secs(60);

/// Store-backed fixed-window rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    store: Store,
    limits: LimitsConfig,
}

impl RateLimiter {
    pub fn new(store: Store, limits: LimitsConfig) -> Self {
        Self { store, limits }
    }

    /// Check whether `uid` may relay another message.
    pub async fn check_message(&self, uid: Uid) -> Result<bool, StoreError> {
        self.check("message", uid, self.limits.messages_per_minute)
            .await
    }

    /// Check whether `uid` may run `/chat` again.
    pub async fn check_chat(&self, uid: Uid) -> Result<bool, StoreError> {
        self.check("chat", uid, self.limits.chat_per_minute).await
    }

    /// Check whether `uid` may run `/next` again.
    pub async fn check_next(&self, uid: Uid) -> Result<bool, StoreError> {
        self.check("next", uid, self.limits.next_per_minute).await
    }

    async fn check(&self, op: &str, uid: Uid, limit: u32) -> Result<bool, StoreError> {
        let key = keys::ratelimit(op, uid);
        let count = self.store.incr(&key).await?;
        if count == 1 {
            self.store.expire(&key, WINDOW).await?;
        }
        let allowed = count <= i64::from(limit);
        if !allowed {
            debug!(uid = uid, op = op, count = count, "rate limit exceeded");
        }
        Ok(allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryBackend::new()),
            LimitsConfig {
                messages_per_minute: 2,
                chat_per_minute: 1,
                next_per_minute: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_message_window_counts() {
        let limiter = limiter();
        assert!(limiter.check_message(1).await.unwrap());
        assert!(limiter.check_message(1).await.unwrap());
        assert!(!limiter.check_message(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let limiter = limiter();
        assert!(limiter.check_chat(1).await.unwrap());
        assert!(!limiter.check_chat(1).await.unwrap());
        assert!(limiter.check_chat(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_are_independent() {
        let limiter = limiter();
        assert!(limiter.check_chat(1).await.unwrap());
        assert!(limiter.check_next(1).await.unwrap());
        assert!(!limiter.check_chat(1).await.unwrap());
    }
}

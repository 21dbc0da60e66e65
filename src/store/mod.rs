//! Typed adapter over the shared key/value session store.
//!
//! The [`Backend`] trait is the seam between the relay core and the store:
//! plain typed primitives (strings, lists, sets, hashes, TTLs) plus the
//! multi-key atomic operations the pairing protocol needs, exposed as named
//! methods so results are typed at the call site.
//!
//! Two backends ship:
//! - [`redis::RedisBackend`] - production; the atomic operations run as Lua
//!   scripts registered at construction.
//! - [`memory::MemoryBackend`] - a single-process map behind one lock, used
//!   by the test harness. Same trait, inherently atomic.
//!
//! Failures surface as [`StoreError`]; there are no silent retries.

pub mod keys;
pub mod memory;
pub mod redis;

use crate::Uid;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared handle to the session store.
pub type Store = Arc<dyn Backend>;

/// Store-level errors.
///
/// Kept in this module next to the redis driver, which supplies the only
/// `#[from]` conversion.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[from] ::redis::RedisError),

    #[error("store connection closed")]
    Closed,

    /// A stored value did not have the shape this call site expects.
    #[error("malformed store value at {0}")]
    Corrupt(String),
}

/// Result of the atomic join-or-match operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A candidate was still queued; both pair and state keys are set.
    Matched(Uid),
    /// No candidate survived; the caller is now waiting in the queue.
    Queued,
    /// The queue cap was reached; nothing was written.
    QueueFull,
}

/// The store primitives the relay core is built on.
#[async_trait]
pub trait Backend: Send + Sync {
    // --- strings --------------------------------------------------------

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<(), StoreError>;
    /// Set only if absent. Returns whether the key was written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;
    async fn del(&self, key: &str) -> Result<(), StoreError>;
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    // --- lists ----------------------------------------------------------

    async fn lpush(&self, key: &str, value: &str) -> Result<i64, StoreError>;
    async fn rpop(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Full contents, head first (newest push first).
    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn llen(&self, key: &str) -> Result<usize, StoreError>;
    /// Remove every occurrence of `value`. Returns how many were removed.
    async fn lrem(&self, key: &str, value: &str) -> Result<i64, StoreError>;

    // --- sets -----------------------------------------------------------

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn srem(&self, key: &str, member: &str) -> Result<(), StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn scard(&self, key: &str) -> Result<usize, StoreError>;

    // --- hashes ---------------------------------------------------------

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hset_multiple(&self, key: &str, fields: &[(&str, String)])
    -> Result<(), StoreError>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    // --- atomic pairing operations --------------------------------------

    /// Pop the first of `candidates` still present in the waiting queue and
    /// pair it with `me` (both pair keys, both states `IN_CHAT`, active-set
    /// membership) in one atomic step. When no candidate survives, enqueue
    /// `me` instead, unless the queue already holds `max_queue` users.
    ///
    /// `candidates` must already be compatibility-filtered and
    /// priority-ordered; this operation only guarantees the winner was still
    /// queued at decision time.
    async fn join_or_match(
        &self,
        me: Uid,
        candidates: &[Uid],
        ttl: Duration,
        max_queue: usize,
    ) -> Result<JoinOutcome, StoreError>;

    /// Tear down the pair `a`/`b` if and only if it is still mutual.
    /// Deletes both pair keys and both state keys. Returns whether the pair
    /// existed.
    async fn break_pair(&self, a: Uid, b: Uid) -> Result<bool, StoreError>;

    /// Unconditionally pair `a` with `b` (admin force-match). Preconditions
    /// (distinct users, neither in a chat) are the caller's responsibility;
    /// the write itself is atomic.
    async fn force_pair(&self, a: Uid, b: Uid, ttl: Duration) -> Result<(), StoreError>;
}

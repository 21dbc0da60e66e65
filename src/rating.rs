//! Per-user rating counters and the feedback flow storage.
//!
//! Ratings feed back into matching: a score below the toxic threshold (with
//! enough votes to mean something) locks a user out of matching entirely,
//! while consistently well-rated users are matched first. The feedback lock
//! guarantees at most one rating per partner per day.

use crate::Uid;
use crate::store::{Store, StoreError, keys};
use std::collections::HashMap;
use std::time::Duration;

/// Score below which a sufficiently-rated user is excluded from matching.
pub const TOXIC_MAX_SCORE: f64 = 30.0;
/// Minimum ratings before the toxic flag can apply.
pub const TOXIC_MIN_RATED: i64 = 5;
/// Score at or above which a user gets matching priority.
pub const PRIORITY_MIN_SCORE: f64 = 70.0;
/// Minimum ratings before the priority flag can apply.
pub const PRIORITY_MIN_RATED: i64 = 3;

/// How long a feedback lock prevents re-rating the same partner.
pub const FEEDBACK_LOCK_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How long after a chat ends a rating is still accepted.
pub const PENDING_FEEDBACK_TTL: Duration = Duration::from_secs(5 * 60);

/// Rating counters for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RatingRecord {
    pub positive: i64,
    pub negative: i64,
    pub total_chats: i64,
}

impl RatingRecord {
    pub fn from_hash(hash: &HashMap<String, String>) -> Self {
        let field = |name: &str| -> i64 {
            hash.get(name)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(0)
                .max(0)
        };
        Self {
            positive: field("positive"),
            negative: field("negative"),
            total_chats: field("total_chats"),
        }
    }

    /// Number of votes received.
    pub fn rated(&self) -> i64 {
        self.positive + self.negative
    }

    /// Derived score in `[0, 100]`; neutral 50.0 while unrated.
    pub fn score(&self) -> f64 {
        let rated = self.rated();
        if rated == 0 {
            50.0
        } else {
            self.positive as f64 / rated as f64 * 100.0
        }
    }

    pub fn is_toxic(&self) -> bool {
        self.score() < TOXIC_MAX_SCORE && self.rated() >= TOXIC_MIN_RATED
    }

    pub fn is_priority(&self) -> bool {
        self.score() >= PRIORITY_MIN_SCORE && self.rated() >= PRIORITY_MIN_RATED
    }

    /// Matching priority tier: 0 = priority, 1 = neutral, 2 = low score.
    /// Toxic users never reach the candidate list at all.
    pub fn tier(&self) -> u8 {
        if self.is_priority() {
            0
        } else if self.score() >= TOXIC_MAX_SCORE {
            1
        } else {
            2
        }
    }
}

/// Accessor over rating counters, pending-feedback pointers, and locks.
#[derive(Clone)]
pub struct RatingStore {
    store: Store,
}

impl RatingStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn record(&self, uid: Uid) -> Result<RatingRecord, StoreError> {
        let hash = self.store.hgetall(&keys::rating(uid)).await?;
        Ok(RatingRecord::from_hash(&hash))
    }

    pub async fn incr_total_chats(&self, uid: Uid) -> Result<(), StoreError> {
        self.store
            .hincrby(&keys::rating(uid), "total_chats", 1)
            .await?;
        Ok(())
    }

    /// Apply one vote to `rated`'s counters.
    pub async fn apply_vote(&self, rated: Uid, positive: bool) -> Result<(), StoreError> {
        let field = if positive { "positive" } else { "negative" };
        self.store.hincrby(&keys::rating(rated), field, 1).await?;
        Ok(())
    }

    /// Try to take the 24 h feedback lock for (rater, rated). Returns
    /// whether the lock was acquired, i.e. whether the vote may proceed.
    pub async fn lock_feedback(&self, rater: Uid, rated: Uid) -> Result<bool, StoreError> {
        self.store
            .set_nx(&keys::feedback(rater, rated), "1", FEEDBACK_LOCK_TTL)
            .await
    }

    /// Point `uid` at the partner they may rate for the next few minutes.
    pub async fn arm_pending(&self, uid: Uid, partner: Uid) -> Result<(), StoreError> {
        self.store
            .set(
                &keys::pending_feedback(uid),
                &partner.to_string(),
                Some(PENDING_FEEDBACK_TTL),
            )
            .await
    }

    /// The partner `uid` may still rate, if the window is open.
    pub async fn pending_partner(&self, uid: Uid) -> Result<Option<Uid>, StoreError> {
        let raw = self.store.get(&keys::pending_feedback(uid)).await?;
        Ok(raw.and_then(|v| v.parse().ok()))
    }

    pub async fn clear_pending(&self, uid: Uid) -> Result<(), StoreError> {
        self.store.del(&keys::pending_feedback(uid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use std::sync::Arc;

    fn record(positive: i64, negative: i64) -> RatingRecord {
        RatingRecord {
            positive,
            negative,
            total_chats: 0,
        }
    }

    #[test]
    fn test_unrated_score_is_neutral() {
        assert_eq!(record(0, 0).score(), 50.0);
        assert!(!record(0, 0).is_toxic());
        assert!(!record(0, 0).is_priority());
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(record(10, 0).score(), 100.0);
        assert_eq!(record(0, 10).score(), 0.0);
    }

    #[test]
    fn test_toxic_needs_enough_votes() {
        // 20% score but only 4 votes: not yet toxic.
        assert!(!record(1, 4).is_toxic());
        // 20% with 5 votes: toxic.
        assert!(record(1, 4 + 1).is_toxic());
        // Plenty of votes but a decent score: not toxic.
        assert!(!record(6, 4).is_toxic());
    }

    #[test]
    fn test_priority_needs_enough_votes() {
        assert!(!record(2, 0).is_priority());
        assert!(record(3, 0).is_priority());
        assert!(record(7, 3).is_priority());
        assert!(!record(6, 4).is_priority());
    }

    #[test]
    fn test_tier_ordering() {
        assert_eq!(record(5, 0).tier(), 0);
        assert_eq!(record(1, 1).tier(), 1);
        // Low score, few votes: deprioritized but not excluded.
        assert_eq!(record(0, 2).tier(), 2);
    }

    #[tokio::test]
    async fn test_vote_and_lock_roundtrip() {
        let ratings = RatingStore::new(Arc::new(MemoryBackend::new()));

        assert!(ratings.lock_feedback(1, 2).await.unwrap());
        ratings.apply_vote(2, true).await.unwrap();
        // Second rating of the same partner is locked out.
        assert!(!ratings.lock_feedback(1, 2).await.unwrap());
        // The reverse direction has its own lock.
        assert!(ratings.lock_feedback(2, 1).await.unwrap());

        let record = ratings.record(2).await.unwrap();
        assert_eq!(record.positive, 1);
        assert_eq!(record.negative, 0);
    }

    #[tokio::test]
    async fn test_pending_pointer_roundtrip() {
        let ratings = RatingStore::new(Arc::new(MemoryBackend::new()));
        assert_eq!(ratings.pending_partner(1).await.unwrap(), None);
        ratings.arm_pending(1, 2).await.unwrap();
        assert_eq!(ratings.pending_partner(1).await.unwrap(), Some(2));
        ratings.clear_pending(1).await.unwrap();
        assert_eq!(ratings.pending_partner(1).await.unwrap(), None);
    }
}

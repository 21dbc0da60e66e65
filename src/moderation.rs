//! Moderation: bans, warnings, reports, and the global filter toggles.
//!
//! Enforcement is purely at the gates - the router and every command check
//! `check_ban` before doing anything. Temporary bans ride on the store TTL;
//! `check_ban` also validates `expires_at` itself so a stale record can
//! never re-ban a user.

use crate::Uid;
use crate::store::{Store, StoreError, keys};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Why a user was banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BanReason {
    Nudity,
    Spam,
    Abuse,
    FakeReports,
    Harassment,
}

impl BanReason {
    pub const ALL: &'static [BanReason] = &[
        Self::Nudity,
        Self::Spam,
        Self::Abuse,
        Self::FakeReports,
        Self::Harassment,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "nudity" => Some(Self::Nudity),
            "spam" => Some(Self::Spam),
            "abuse" => Some(Self::Abuse),
            "fake_reports" | "fakereports" => Some(Self::FakeReports),
            "harassment" => Some(Self::Harassment),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Nudity => "nudity",
            Self::Spam => "spam",
            Self::Abuse => "abuse",
            Self::FakeReports => "fake_reports",
            Self::Harassment => "harassment",
        }
    }
}

/// Ban length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanDuration {
    Temporary(Duration),
    Permanent,
}

/// A stored ban record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanRecord {
    pub banned_by: String,
    pub reason: BanReason,
    pub banned_at: i64,
    pub expires_at: Option<i64>,
    pub is_permanent: bool,
    pub is_auto_ban: bool,
}

impl BanRecord {
    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("banned_by", self.banned_by.clone()),
            ("reason", self.reason.label().to_string()),
            ("banned_at", self.banned_at.to_string()),
            (
                "expires_at",
                self.expires_at.map(|v| v.to_string()).unwrap_or_default(),
            ),
            ("is_permanent", i64::from(self.is_permanent).to_string()),
            ("is_auto_ban", i64::from(self.is_auto_ban).to_string()),
        ]
    }

    pub fn from_hash(hash: &HashMap<String, String>) -> Option<Self> {
        let reason = BanReason::parse(hash.get("reason")?)?;
        Some(Self {
            banned_by: hash.get("banned_by").cloned().unwrap_or_default(),
            reason,
            banned_at: hash.get("banned_at").and_then(|v| v.parse().ok())?,
            expires_at: hash
                .get("expires_at")
                .filter(|v| !v.is_empty())
                .and_then(|v| v.parse().ok()),
            is_permanent: hash.get("is_permanent").map(String::as_str) == Some("1"),
            is_auto_ban: hash.get("is_auto_ban").map(String::as_str) == Some("1"),
        })
    }

    fn is_expired(&self, now: i64) -> bool {
        !self.is_permanent && self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Outcome of recording a report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// This reporter already reported this target recently.
    Duplicate,
    /// Counted; threshold not reached.
    Counted(i64),
    /// The report tripped the auto-ban threshold.
    AutoBanned(BanRecord),
}

/// How long one report blocks the same reporter/target combination.
const REPORT_LOCK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Store-backed moderation operations.
#[derive(Clone)]
pub struct ModerationStore {
    store: Store,
    auto_ban_threshold: i64,
    auto_ban_days: i64,
}

impl ModerationStore {
    pub fn new(store: Store, auto_ban_threshold: i64, auto_ban_days: i64) -> Self {
        Self {
            store,
            auto_ban_threshold,
            auto_ban_days,
        }
    }

    // --- bans -----------------------------------------------------------

    pub async fn ban(
        &self,
        target: Uid,
        reason: BanReason,
        duration: BanDuration,
        by: &str,
        is_auto_ban: bool,
    ) -> Result<BanRecord, StoreError> {
        let now = chrono::Utc::now().timestamp();
        let (expires_at, ttl, is_permanent) = match duration {
            BanDuration::Temporary(ttl) => (Some(now + ttl.as_secs() as i64), Some(ttl), false),
            BanDuration::Permanent => (None, None, true),
        };
        let record = BanRecord {
            banned_by: by.to_string(),
            reason,
            banned_at: now,
            expires_at,
            is_permanent,
            is_auto_ban,
        };

        let key = keys::ban(target);
        self.store.hset_multiple(&key, &record.fields()).await?;
        match ttl {
            Some(ttl) => self.store.expire(&key, ttl).await?,
            None => {}
        }
        self.store
            .sadd(keys::BANNED_SET, &target.to_string())
            .await?;
        info!(
            target = target,
            reason = reason.label(),
            permanent = is_permanent,
            auto = is_auto_ban,
            "User banned"
        );
        Ok(record)
    }

    /// Lift a ban. Returns `false` when the target was not banned (the
    /// operation is an explicit no-op then).
    pub async fn unban(&self, target: Uid) -> Result<bool, StoreError> {
        let was_banned = self.check_ban(target).await?.is_some();
        self.store.del(&keys::ban(target)).await?;
        self.store
            .srem(keys::BANNED_SET, &target.to_string())
            .await?;
        if was_banned {
            info!(target = target, "User unbanned");
        }
        Ok(was_banned)
    }

    /// The active ban record for a user, if any. Expired records are
    /// cleaned up on sight.
    pub async fn check_ban(&self, uid: Uid) -> Result<Option<BanRecord>, StoreError> {
        let hash = self.store.hgetall(&keys::ban(uid)).await?;
        if hash.is_empty() {
            return Ok(None);
        }
        let record = BanRecord::from_hash(&hash)
            .ok_or_else(|| StoreError::Corrupt(keys::ban(uid)))?;
        if record.is_expired(chrono::Utc::now().timestamp()) {
            self.store.del(&keys::ban(uid)).await?;
            self.store.srem(keys::BANNED_SET, &uid.to_string()).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// All currently banned users with their records.
    pub async fn list_banned(&self) -> Result<Vec<(Uid, BanRecord)>, StoreError> {
        let members = self.store.smembers(keys::BANNED_SET).await?;
        let mut banned = Vec::new();
        for raw in members {
            let Ok(uid) = raw.parse::<Uid>() else { continue };
            match self.check_ban(uid).await? {
                Some(record) => banned.push((uid, record)),
                // TTL fired; keep the listing set honest.
                None => self.store.srem(keys::BANNED_SET, &raw).await?,
            }
        }
        banned.sort_by_key(|(uid, _)| *uid);
        Ok(banned)
    }

    // --- warnings -------------------------------------------------------

    /// Record a warning. Returns the new warning count.
    pub async fn warn(&self, target: Uid, reason: &str, by: &str) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.store
            .lpush(&keys::warnings(target), &format!("{now}|{by}|{reason}"))
            .await?;
        let count = self.store.incr(&keys::warning_count(target)).await?;
        self.store
            .sadd(keys::WARNING_SET, &target.to_string())
            .await?;
        info!(target = target, count = count, "User warned");
        Ok(count)
    }

    pub async fn warning_count(&self, uid: Uid) -> Result<i64, StoreError> {
        let raw = self.store.get(&keys::warning_count(uid)).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// All users with at least one warning and their counts.
    pub async fn list_warned(&self) -> Result<Vec<(Uid, i64)>, StoreError> {
        let members = self.store.smembers(keys::WARNING_SET).await?;
        let mut warned = Vec::new();
        for raw in members {
            let Ok(uid) = raw.parse::<Uid>() else { continue };
            let count = self.warning_count(uid).await?;
            if count > 0 {
                warned.push((uid, count));
            }
        }
        warned.sort_by_key(|(uid, _)| *uid);
        Ok(warned)
    }

    // --- reports --------------------------------------------------------

    /// Count a report against `target`. At the threshold, and only when the
    /// target is not already banned, the system issues the auto-ban.
    pub async fn record_report(&self, target: Uid, by: Uid) -> Result<ReportOutcome, StoreError> {
        let lock_taken = self
            .store
            .set_nx(&keys::report_lock(by, target), "1", REPORT_LOCK_TTL)
            .await?;
        if !lock_taken {
            return Ok(ReportOutcome::Duplicate);
        }

        let count = self.store.incr(&keys::report_count(target)).await?;
        info!(target = target, count = count, "Report recorded");

        if count >= self.auto_ban_threshold && self.check_ban(target).await?.is_none() {
            let record = self
                .ban(
                    target,
                    BanReason::Abuse,
                    BanDuration::Temporary(Duration::from_secs(
                        self.auto_ban_days as u64 * 86_400,
                    )),
                    "system",
                    true,
                )
                .await?;
            return Ok(ReportOutcome::AutoBanned(record));
        }
        Ok(ReportOutcome::Counted(count))
    }

    // --- global filter toggles ------------------------------------------

    pub async fn gender_filter_enabled(&self) -> Result<bool, StoreError> {
        self.toggle(keys::GENDER_FILTER_ENABLED).await
    }

    pub async fn regional_filter_enabled(&self) -> Result<bool, StoreError> {
        self.toggle(keys::REGIONAL_FILTER_ENABLED).await
    }

    pub async fn set_gender_filter(&self, enabled: bool) -> Result<(), StoreError> {
        self.store
            .set(keys::GENDER_FILTER_ENABLED, if enabled { "1" } else { "0" }, None)
            .await
    }

    pub async fn set_regional_filter(&self, enabled: bool) -> Result<(), StoreError> {
        self.store
            .set(
                keys::REGIONAL_FILTER_ENABLED,
                if enabled { "1" } else { "0" },
                None,
            )
            .await
    }

    /// Absent defaults to enabled.
    async fn toggle(&self, key: &str) -> Result<bool, StoreError> {
        let raw = self.store.get(key).await?;
        Ok(raw.as_deref() != Some("0"))
    }

    // --- blocked media ---------------------------------------------------

    pub async fn is_media_blocked(&self, kind: &str) -> Result<bool, StoreError> {
        self.store.sismember(keys::BLOCKED_MEDIA, kind).await
    }

    pub async fn block_media(&self, kind: &str) -> Result<(), StoreError> {
        self.store.sadd(keys::BLOCKED_MEDIA, kind).await
    }

    pub async fn unblock_media(&self, kind: &str) -> Result<(), StoreError> {
        self.store.srem(keys::BLOCKED_MEDIA, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackend;
    use std::sync::Arc;

    fn moderation() -> ModerationStore {
        ModerationStore::new(Arc::new(MemoryBackend::new()), 5, 7)
    }

    #[tokio::test]
    async fn test_ban_record_roundtrip() {
        let moderation = moderation();
        let record = moderation
            .ban(
                9,
                BanReason::Harassment,
                BanDuration::Temporary(Duration::from_secs(3600)),
                "admin:1",
                false,
            )
            .await
            .unwrap();
        assert!(!record.is_permanent);
        assert!(record.expires_at.is_some());

        let loaded = moderation.check_ban(9).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(moderation.list_banned().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unban_is_idempotent() {
        let moderation = moderation();
        moderation
            .ban(9, BanReason::Spam, BanDuration::Permanent, "admin:1", false)
            .await
            .unwrap();
        assert!(moderation.unban(9).await.unwrap());
        assert!(!moderation.unban(9).await.unwrap());
        assert!(moderation.check_ban(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_record_reads_as_unbanned() {
        let moderation = moderation();
        // Write a record whose expires_at is already in the past but whose
        // TTL has not fired (memory backend honors TTLs lazily anyway).
        let past = chrono::Utc::now().timestamp() - 10;
        let record = BanRecord {
            banned_by: "admin:1".into(),
            reason: BanReason::Spam,
            banned_at: past - 100,
            expires_at: Some(past),
            is_permanent: false,
            is_auto_ban: false,
        };
        moderation
            .store
            .hset_multiple(&keys::ban(3), &record.fields())
            .await
            .unwrap();
        moderation.store.sadd(keys::BANNED_SET, "3").await.unwrap();

        assert!(moderation.check_ban(3).await.unwrap().is_none());
        assert!(moderation.list_banned().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_trip_auto_ban_at_threshold() {
        let moderation = moderation();
        for reporter in 1..=4 {
            let outcome = moderation.record_report(50, reporter).await.unwrap();
            assert_eq!(outcome, ReportOutcome::Counted(reporter));
        }
        let outcome = moderation.record_report(50, 5).await.unwrap();
        let ReportOutcome::AutoBanned(record) = outcome else {
            panic!("expected auto-ban, got {outcome:?}");
        };
        assert!(record.is_auto_ban);
        assert_eq!(record.reason, BanReason::Abuse);
        assert_eq!(record.banned_by, "system");
        assert!(!record.is_permanent);
    }

    #[tokio::test]
    async fn test_duplicate_report_not_counted() {
        let moderation = moderation();
        moderation.record_report(50, 1).await.unwrap();
        let outcome = moderation.record_report(50, 1).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Duplicate);
    }

    #[tokio::test]
    async fn test_already_banned_target_not_rebanned() {
        let moderation = moderation();
        moderation
            .ban(50, BanReason::Nudity, BanDuration::Permanent, "admin:1", false)
            .await
            .unwrap();
        for reporter in 1..=6 {
            let outcome = moderation.record_report(50, reporter).await.unwrap();
            assert!(matches!(outcome, ReportOutcome::Counted(_)));
        }
        // The original permanent ban is untouched.
        let record = moderation.check_ban(50).await.unwrap().unwrap();
        assert!(record.is_permanent);
    }

    #[tokio::test]
    async fn test_toggles_default_on() {
        let moderation = moderation();
        assert!(moderation.gender_filter_enabled().await.unwrap());
        moderation.set_gender_filter(false).await.unwrap();
        assert!(!moderation.gender_filter_enabled().await.unwrap());
        moderation.set_gender_filter(true).await.unwrap();
        assert!(moderation.gender_filter_enabled().await.unwrap());
    }

    #[tokio::test]
    async fn test_blocked_media_roundtrip() {
        let moderation = moderation();
        assert!(!moderation.is_media_blocked("sticker").await.unwrap());
        moderation.block_media("sticker").await.unwrap();
        assert!(moderation.is_media_blocked("sticker").await.unwrap());
        moderation.unblock_media("sticker").await.unwrap();
        assert!(!moderation.is_media_blocked("sticker").await.unwrap());
    }
}

//! The matching engine.
//!
//! `find_partner` gates the caller (ban, toxicity, current state), builds a
//! compatibility-filtered, priority-ordered candidate list from a queue
//! snapshot, and hands the list to the atomic join-or-match operation. The
//! store decides who is still actually available; this module only decides
//! who is acceptable and in what order.

use crate::Uid;
use crate::moderation::ModerationStore;
use crate::profile::{Preferences, Profile, ProfileStore};
use crate::rating::{RatingRecord, RatingStore};
use crate::state::queue::Queue;
use crate::state::{SessionState, StateStore};
use crate::store::{JoinOutcome, Store, StoreError};
use std::time::Duration;
use tracing::debug;

/// Why matching refused to run for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Banned,
    Toxic,
    AlreadyActive,
    QueueFull,
}

/// Result of a matching attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(Uid),
    Queued,
    Rejected(RejectReason),
}

/// Everything compatibility needs to know about one side.
#[derive(Debug, Clone, Default)]
pub struct PartyView {
    pub profile: Profile,
    pub preferences: Preferences,
    pub rating: RatingRecord,
}

/// Mutual compatibility under the global toggles.
///
/// Gender: each side's gender must satisfy the other side's filter (an
/// unset gender satisfies only `Any`). Country: symmetric likewise. A
/// disabled toggle bypasses that dimension entirely.
pub fn compatible(a: &PartyView, b: &PartyView, gender_on: bool, regional_on: bool) -> bool {
    if gender_on
        && !(a.preferences.gender_filter.accepts(b.profile.gender)
            && b.preferences.gender_filter.accepts(a.profile.gender))
    {
        return false;
    }
    if regional_on
        && !(a.preferences.accepts_country(b.profile.country.as_deref())
            && b.preferences.accepts_country(a.profile.country.as_deref()))
    {
        return false;
    }
    true
}

/// Order candidate ids by rating tier, preserving FIFO order within a tier.
pub fn order_candidates(mut candidates: Vec<(Uid, u8)>) -> Vec<Uid> {
    candidates.sort_by_key(|(_, tier)| *tier);
    candidates.into_iter().map(|(uid, _)| uid).collect()
}

/// The matching engine.
#[derive(Clone)]
pub struct MatchingEngine {
    store: Store,
    state: StateStore,
    queue: Queue,
    profiles: ProfileStore,
    ratings: RatingStore,
    moderation: ModerationStore,
    chat_ttl: Duration,
    max_queue: usize,
}

impl MatchingEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        state: StateStore,
        queue: Queue,
        profiles: ProfileStore,
        ratings: RatingStore,
        moderation: ModerationStore,
        chat_ttl: Duration,
        max_queue: usize,
    ) -> Self {
        Self {
            store,
            state,
            queue,
            profiles,
            ratings,
            moderation,
            chat_ttl,
            max_queue,
        }
    }

    async fn view(&self, uid: Uid) -> Result<PartyView, StoreError> {
        Ok(PartyView {
            profile: self.profiles.profile(uid).await?,
            preferences: self.profiles.preferences(uid).await?,
            rating: self.ratings.record(uid).await?,
        })
    }

    /// Try to pair `me` with someone waiting, or park them in the queue.
    pub async fn find_partner(&self, me: Uid) -> Result<MatchOutcome, StoreError> {
        if self.moderation.check_ban(me).await?.is_some() {
            return Ok(MatchOutcome::Rejected(RejectReason::Banned));
        }
        let my_view = self.view(me).await?;
        if my_view.rating.is_toxic() {
            return Ok(MatchOutcome::Rejected(RejectReason::Toxic));
        }
        if self.state.session(me).await? != SessionState::Idle {
            return Ok(MatchOutcome::Rejected(RejectReason::AlreadyActive));
        }

        let gender_on = self.moderation.gender_filter_enabled().await?;
        let regional_on = self.moderation.regional_filter_enabled().await?;

        let snapshot = self.queue.snapshot().await?;
        let mut candidates = Vec::with_capacity(snapshot.len());
        for candidate in snapshot {
            if candidate == me {
                continue;
            }
            let view = self.view(candidate).await?;
            if view.rating.is_toxic() {
                continue;
            }
            if !compatible(&my_view, &view, gender_on, regional_on) {
                continue;
            }
            candidates.push((candidate, view.rating.tier()));
        }
        let ordered = order_candidates(candidates);
        debug!(
            uid = me,
            candidates = ordered.len(),
            gender_on = gender_on,
            regional_on = regional_on,
            "Matching attempt"
        );

        let outcome = self
            .store
            .join_or_match(me, &ordered, self.chat_ttl, self.max_queue)
            .await?;
        Ok(match outcome {
            JoinOutcome::Matched(partner) => MatchOutcome::Matched(partner),
            JoinOutcome::Queued => MatchOutcome::Queued,
            JoinOutcome::QueueFull => MatchOutcome::Rejected(RejectReason::QueueFull),
        })
    }
}

//! Pair lifecycle management.
//!
//! Creation and teardown always go through the atomic store operations, so
//! a half-paired state can never be observed. Notifications are best-effort:
//! a failed send never rolls back a completed transition (an unreachable
//! side is reaped by its own relay attempt or by the sweeper).

use crate::Uid;
use crate::error::RelayError;
use crate::moderation::ModerationStore;
use crate::profile::ProfileStore;
use crate::rating::RatingStore;
use crate::state::queue::Queue;
use crate::state::{SessionState, StateStore};
use crate::store::Store;
use crate::texts;
use crate::transport::Transport;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Why a chat is being ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    /// The initiator sent `/stop`.
    Stopped,
    /// The initiator sent `/next` (they are about to re-match).
    Next,
    /// The inactivity sweeper fired.
    Inactivity,
    /// The initiator got banned mid-chat.
    Banned,
    /// The initiator's partner cannot be reached anymore.
    Unreachable,
}

/// What `end_chat` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// A live chat with this partner was torn down.
    EndedChat(Uid),
    /// The initiator was only queued; they left the queue.
    LeftQueue,
    /// Nothing to end.
    NotActive,
}

/// Pair lifecycle manager.
#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    state: StateStore,
    queue: Queue,
    profiles: ProfileStore,
    ratings: RatingStore,
    moderation: ModerationStore,
    transport: Arc<dyn Transport>,
    chat_ttl: Duration,
}

impl SessionManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        state: StateStore,
        queue: Queue,
        profiles: ProfileStore,
        ratings: RatingStore,
        moderation: ModerationStore,
        transport: Arc<dyn Transport>,
        chat_ttl: Duration,
    ) -> Self {
        Self {
            store,
            state,
            queue,
            profiles,
            ratings,
            moderation,
            transport,
            chat_ttl,
        }
    }

    /// Pair-created flow: stamp activity, count the chat for both sides,
    /// drop stale feedback pointers, and show each side the other's card.
    pub async fn announce_match(&self, a: Uid, b: Uid, special: bool) -> Result<(), RelayError> {
        self.state.touch(a).await?;
        self.state.touch(b).await?;
        self.ratings.incr_total_chats(a).await?;
        self.ratings.incr_total_chats(b).await?;
        self.ratings.clear_pending(a).await?;
        self.ratings.clear_pending(b).await?;

        let profile_a = self.profiles.profile(a).await?;
        let profile_b = self.profiles.profile(b).await?;
        let text_for = |partner_card: String| {
            if special {
                format!("{}\n\n{partner_card}", texts::SPECIAL_MATCH)
            } else {
                partner_card
            }
        };
        let for_a = text_for(texts::match_found(&profile_b));
        let for_b = text_for(texts::match_found(&profile_a));

        info!(a = a, b = b, special = special, "Pair created");
        let sends = join_all([
            self.transport.send_text(a, &for_a),
            self.transport.send_text(b, &for_b),
        ])
        .await;
        for (uid, result) in [a, b].into_iter().zip(sends) {
            if let Err(err) = result {
                warn!(uid = uid, error = %err, "Match notification failed");
            }
        }
        Ok(())
    }

    /// Break-pair flow. Tears down the initiator's chat if one exists,
    /// otherwise removes them from the queue. Notifies and arms the
    /// feedback window as appropriate for `reason`.
    pub async fn end_chat(
        &self,
        initiator: Uid,
        reason: BreakReason,
    ) -> Result<EndOutcome, RelayError> {
        if let Some(partner) = self.state.partner(initiator).await? {
            if self.store.break_pair(initiator, partner).await? {
                info!(a = initiator, b = partner, reason = ?reason, "Pair broken");
                self.after_break(initiator, partner, reason).await?;
                return Ok(EndOutcome::EndedChat(partner));
            }
            // The partner broke the pair in the same instant; nothing left.
        }
        if self.queue.remove(initiator).await? {
            self.state.clear(initiator).await?;
            info!(uid = initiator, "Left queue");
            return Ok(EndOutcome::LeftQueue);
        }
        Ok(EndOutcome::NotActive)
    }

    /// Inactivity teardown for a known pair (sweeper path).
    pub async fn break_inactive(&self, a: Uid, b: Uid) -> Result<bool, RelayError> {
        if !self.store.break_pair(a, b).await? {
            return Ok(false);
        }
        info!(a = a, b = b, "Pair broken due to inactivity");
        self.after_break(a, b, BreakReason::Inactivity).await?;
        Ok(true)
    }

    /// A freshly banned user leaves whatever they were doing: a live chat
    /// is broken (partner notified, never told why), a queue slot is freed.
    pub async fn enforce_ban_exit(&self, target: Uid) -> Result<(), RelayError> {
        match self.state.session(target).await? {
            SessionState::InChat => {
                if let Some(partner) = self.state.partner(target).await? {
                    if self.store.break_pair(target, partner).await? {
                        self.ratings.arm_pending(partner, target).await?;
                        self.notify_prompt(partner, texts::PARTNER_LEFT).await;
                    }
                }
            }
            SessionState::InQueue => {
                self.queue.remove(target).await?;
                self.state.clear(target).await?;
            }
            SessionState::Idle => {}
        }
        Ok(())
    }

    /// Admin force-match: pair two specific users, bypassing the queue and
    /// all compatibility rules. Both must be distinct, not in a chat, and
    /// not banned.
    pub async fn force_match(&self, u: Uid, v: Uid) -> Result<(), RelayError> {
        if u == v {
            return Err(RelayError::ConflictState(
                "Cannot force-match a user with themselves.",
            ));
        }
        for target in [u, v] {
            if self.state.session(target).await? == SessionState::InChat {
                return Err(RelayError::ConflictState(
                    "One of the users is already in a chat.",
                ));
            }
            if self.moderation.check_ban(target).await?.is_some() {
                return Err(RelayError::ConflictState(
                    "One of the users is banned.",
                ));
            }
        }
        // Free any queue slots first; force_pair overwrites the states.
        self.queue.remove(u).await?;
        self.queue.remove(v).await?;
        self.store.force_pair(u, v, self.chat_ttl).await?;
        self.announce_match(u, v, true).await
    }

    async fn after_break(
        &self,
        initiator: Uid,
        partner: Uid,
        reason: BreakReason,
    ) -> Result<(), RelayError> {
        match reason {
            BreakReason::Stopped | BreakReason::Next => {
                self.ratings.arm_pending(initiator, partner).await?;
                self.ratings.arm_pending(partner, initiator).await?;
                self.notify_prompt(initiator, texts::CHAT_ENDED_BY_YOU).await;
                self.notify_prompt(partner, texts::PARTNER_LEFT).await;
            }
            BreakReason::Inactivity => {
                self.ratings.arm_pending(initiator, partner).await?;
                self.ratings.arm_pending(partner, initiator).await?;
                self.notify_prompt(initiator, texts::CHAT_ENDED_INACTIVITY).await;
                self.notify_prompt(partner, texts::CHAT_ENDED_INACTIVITY).await;
            }
            BreakReason::Banned => {
                // The banned side gets the ban notice from its own gate.
                self.ratings.arm_pending(partner, initiator).await?;
                self.notify_prompt(partner, texts::PARTNER_LEFT).await;
            }
            BreakReason::Unreachable => {
                // The partner is gone; only the live side hears about it.
                self.ratings.arm_pending(initiator, partner).await?;
                self.notify_prompt(initiator, texts::PARTNER_UNREACHABLE).await;
            }
        }
        Ok(())
    }

    /// Send an ending notice with the rating keyboard attached.
    async fn notify_prompt(&self, uid: Uid, ending: &str) {
        let text = format!("{ending}\n\n{}", texts::RATE_PROMPT);
        if let Err(err) = self.transport.send_rating_prompt(uid, &text).await {
            warn!(uid = uid, error = %err, "Ending notification failed");
        }
    }
}

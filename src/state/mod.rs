//! Per-user session state and the pair map.
//!
//! ```text
//! IDLE  --chat-->      IN_QUEUE         (no compatible partner available)
//! IDLE  --chat-->      IN_CHAT          (match found)
//! IN_QUEUE --match-->  IN_CHAT          (another user matched)
//! IN_QUEUE --stop-->   IDLE
//! IN_CHAT  --stop-->   IDLE             (also transitions partner)
//! IN_CHAT  --next-->   IN_QUEUE|IN_CHAT (break then re-match)
//! any      --ban-->    IDLE             (and pair broken)
//! any      --timeout-->IDLE             (inactivity sweeper)
//! ```
//!
//! `IDLE` is represented by key absence; the active states carry the chat
//! timeout as a soft TTL. Pair keys are only ever written by the atomic
//! store operations, so symmetry can never be observed broken.

pub mod queue;

use crate::Uid;
use crate::store::{Store, StoreError, keys};
use std::time::Duration;

/// A user's session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    InQueue,
    InChat,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::InQueue => "IN_QUEUE",
            Self::InChat => "IN_CHAT",
        }
    }

    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("IN_QUEUE") => Self::InQueue,
            Some("IN_CHAT") => Self::InChat,
            _ => Self::Idle,
        }
    }
}

/// Accessor over state, pair, and activity keys.
#[derive(Clone)]
pub struct StateStore {
    store: Store,
    chat_ttl: Duration,
}

impl StateStore {
    pub fn new(store: Store, chat_ttl: Duration) -> Self {
        Self { store, chat_ttl }
    }

    pub async fn session(&self, uid: Uid) -> Result<SessionState, StoreError> {
        let raw = self.store.get(&keys::state(uid)).await?;
        Ok(SessionState::parse(raw.as_deref()))
    }

    /// Current chat partner, if any.
    pub async fn partner(&self, uid: Uid) -> Result<Option<Uid>, StoreError> {
        let raw = self.store.get(&keys::pair(uid)).await?;
        match raw {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::Corrupt(keys::pair(uid))),
        }
    }

    /// Record activity for `uid` and push the chat timeout forward on the
    /// whole pair, both sides, so an active conversation never half-expires.
    pub async fn refresh_activity(&self, uid: Uid) -> Result<(), StoreError> {
        self.touch(uid).await?;
        self.store.expire(&keys::state(uid), self.chat_ttl).await?;
        if let Some(partner) = self.partner(uid).await? {
            self.store.expire(&keys::pair(uid), self.chat_ttl).await?;
            self.store
                .expire(&keys::pair(partner), self.chat_ttl)
                .await?;
            self.store
                .expire(&keys::state(partner), self.chat_ttl)
                .await?;
        }
        Ok(())
    }

    /// Stamp the activity timestamp without touching pair TTLs.
    pub async fn touch(&self, uid: Uid) -> Result<(), StoreError> {
        let now = chrono::Utc::now().timestamp();
        self.store
            .set(&keys::activity(uid), &now.to_string(), Some(self.chat_ttl))
            .await
    }

    /// Unix-seconds timestamp of the user's last activity, if known.
    pub async fn last_activity(&self, uid: Uid) -> Result<Option<i64>, StoreError> {
        let raw = self.store.get(&keys::activity(uid)).await?;
        Ok(raw.and_then(|v| v.parse().ok()))
    }

    /// Drop the state key (back to `IDLE`). Used on queue-leave; chat
    /// teardown goes through the atomic break instead.
    pub async fn clear(&self, uid: Uid) -> Result<(), StoreError> {
        self.store.del(&keys::state(uid)).await
    }
}

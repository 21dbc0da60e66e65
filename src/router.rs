//! The message router: per-update gating, then delivery to the partner.
//!
//! Gate order is fixed: ban, blocked media kind, blocked term, rate window,
//! partner lookup. A gated message is dropped after exactly one notice to
//! the sender. Delivery preserves the envelope untouched; a transient
//! transport failure earns one retry, anything harder ends the session
//! cleanly.

use crate::Uid;
use crate::error::HandlerResult;
use crate::moderation::ModerationStore;
use crate::ratelimit::RateLimiter;
use crate::session::{BreakReason, SessionManager};
use crate::state::StateStore;
use crate::texts;
use crate::transport::{Envelope, Transport, TransportError};
use std::sync::Arc;
use tracing::{debug, warn};

/// The relay router.
#[derive(Clone)]
pub struct Router {
    state: StateStore,
    moderation: ModerationStore,
    limiter: RateLimiter,
    sessions: SessionManager,
    transport: Arc<dyn Transport>,
    /// Lowercased blocked substrings from config; empty = filter off.
    blocked_terms: Vec<String>,
}

impl Router {
    pub fn new(
        state: StateStore,
        moderation: ModerationStore,
        limiter: RateLimiter,
        sessions: SessionManager,
        transport: Arc<dyn Transport>,
        blocked_terms: &[String],
    ) -> Self {
        Self {
            state,
            moderation,
            limiter,
            sessions,
            transport,
            blocked_terms: blocked_terms
                .iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    fn blocked_term(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.blocked_terms
            .iter()
            .find(|term| haystack.contains(term.as_str()))
            .map(String::as_str)
    }

    /// Relay one envelope from `sender` to their partner.
    pub async fn relay(&self, sender: Uid, envelope: &Envelope) -> HandlerResult {
        if let Some(record) = self.moderation.check_ban(sender).await? {
            self.notify(sender, &texts::banned_notice(&record)).await;
            return Ok(());
        }

        if self.moderation.is_media_blocked(envelope.kind()).await? {
            self.notify(sender, texts::MEDIA_BLOCKED).await;
            return Ok(());
        }

        if let Some(text) = envelope.visible_text() {
            if let Some(term) = self.blocked_term(text) {
                debug!(uid = sender, term = term, "Message blocked by content filter");
                self.notify(sender, texts::TERM_BLOCKED).await;
                return Ok(());
            }
        }

        if !self.limiter.check_message(sender).await? {
            self.notify(sender, texts::RATE_LIMITED).await;
            return Ok(());
        }

        let Some(partner) = self.state.partner(sender).await? else {
            self.notify(sender, texts::NOT_IN_CHAT).await;
            return Ok(());
        };

        self.state.refresh_activity(sender).await?;
        self.deliver(sender, partner, envelope).await
    }

    async fn deliver(&self, sender: Uid, partner: Uid, envelope: &Envelope) -> HandlerResult {
        let first = self.transport.send_envelope(partner, envelope).await;
        let err = match first {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if let TransportError::Transient(detail) = &err {
            debug!(partner = partner, detail = %detail, "Transient delivery failure, retrying once");
            if self.transport.send_envelope(partner, envelope).await.is_ok() {
                return Ok(());
            }
            // A repeated transient failure counts as unreachable.
        }

        warn!(sender = sender, partner = partner, error = %err, "Partner unreachable, ending chat");
        self.sessions
            .end_chat(sender, BreakReason::Unreachable)
            .await?;
        Ok(())
    }

    async fn notify(&self, uid: Uid, text: &str) {
        if let Err(err) = self.transport.send_text(uid, text).await {
            debug!(uid = uid, error = %err, "Notice delivery failed");
        }
    }
}

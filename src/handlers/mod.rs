//! Command handlers.
//!
//! The dispatcher translates platform updates into calls here. Every
//! handler performs its ban check first, completes one coherent state
//! transition, and reports at most one notice. The split mirrors the
//! command surface: [`user`] for everyone, [`admin`] for the configured
//! admin ids, [`flow`] for multi-step admin conversations.

pub mod admin;
pub mod flow;
pub mod user;

use crate::Uid;
use crate::error::RelayError;
use crate::relay::Relay;
use crate::texts;

/// Ban gate shared by every user-facing command. Sends the ban notice and
/// returns `true` when the caller is banned (the command is then done).
pub(crate) async fn ban_gate(relay: &Relay, uid: Uid) -> Result<bool, RelayError> {
    match relay.moderation.check_ban(uid).await? {
        Some(record) => {
            notify(relay, uid, &texts::banned_notice(&record)).await;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Best-effort notice; a failed send is logged by the transport caller and
/// never fails the handler.
pub(crate) async fn notify(relay: &Relay, uid: Uid, text: &str) {
    if let Err(err) = relay.transport.send_text(uid, text).await {
        tracing::debug!(uid = uid, error = %err, "Notice delivery failed");
    }
}

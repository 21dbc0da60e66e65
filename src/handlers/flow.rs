//! Multi-step admin conversations.
//!
//! Flow state is serialized into the store under `adminflow:{admin_id}`
//! with a short TTL - never held in process memory, so any bot process can
//! continue a conversation another one started. A parse failure keeps the
//! flow at its current step; `cancel` (or the TTL) abandons it.

use super::{admin, notify};
use crate::Uid;
use crate::error::{HandlerResult, RelayError};
use crate::moderation::BanReason;
use crate::relay::Relay;
use crate::store::keys;
use crate::texts;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long an abandoned flow lingers.
const FLOW_TTL: Duration = Duration::from_secs(5 * 60);

/// One step of an admin conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
enum AdminFlow {
    BanTarget,
    BanReason { target: Uid },
    BanDuration { target: Uid, reason: BanReason },
}

async fn save(relay: &Relay, admin: Uid, flow: &AdminFlow) -> Result<(), RelayError> {
    let raw = serde_json::to_string(flow)
        .map_err(|_| RelayError::BadInput("flow state".into()))?;
    relay
        .store
        .set(&keys::adminflow(admin), &raw, Some(FLOW_TTL))
        .await?;
    Ok(())
}

async fn load(relay: &Relay, admin: Uid) -> Result<Option<AdminFlow>, RelayError> {
    let raw = relay.store.get(&keys::adminflow(admin)).await?;
    Ok(raw.and_then(|raw| serde_json::from_str(&raw).ok()))
}

async fn clear(relay: &Relay, admin: Uid) -> Result<(), RelayError> {
    relay.store.del(&keys::adminflow(admin)).await?;
    Ok(())
}

/// Whether `admin` has a conversation in progress (their plain text then
/// belongs to the flow, not the router).
pub async fn is_active(relay: &Relay, admin: Uid) -> Result<bool, RelayError> {
    Ok(relay.store.exists(&keys::adminflow(admin)).await?)
}

/// Start the step-by-step `/ban` conversation.
pub async fn begin_ban(relay: &Relay, admin: Uid) -> HandlerResult {
    save(relay, admin, &AdminFlow::BanTarget).await?;
    notify(relay, admin, texts::FLOW_BAN_TARGET).await;
    Ok(())
}

/// Feed one line of admin input into the active flow.
pub async fn on_text(relay: &Relay, admin: Uid, text: &str) -> HandlerResult {
    let Some(flow) = load(relay, admin).await? else {
        return Ok(());
    };
    let text = text.trim();
    if text.eq_ignore_ascii_case("cancel") {
        clear(relay, admin).await?;
        notify(relay, admin, texts::FLOW_CANCELLED).await;
        return Ok(());
    }

    match flow {
        AdminFlow::BanTarget => {
            let target: Uid = text
                .parse()
                .map_err(|_| RelayError::BadInput("Expected a numeric user id.".into()))?;
            save(relay, admin, &AdminFlow::BanReason { target }).await?;
            notify(relay, admin, texts::FLOW_BAN_REASON).await;
        }
        AdminFlow::BanReason { target } => {
            let reason = BanReason::parse(text)
                .ok_or_else(|| RelayError::BadInput(texts::FLOW_BAN_REASON.into()))?;
            save(relay, admin, &AdminFlow::BanDuration { target, reason }).await?;
            notify(relay, admin, texts::FLOW_BAN_DURATION).await;
        }
        AdminFlow::BanDuration { target, reason } => {
            let duration = admin::parse_ban_duration(text)?;
            clear(relay, admin).await?;
            admin::apply_ban(relay, admin, target, reason, duration).await?;
        }
    }
    Ok(())
}

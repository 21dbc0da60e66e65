//! Background maintenance task.
//!
//! Ticks at a tenth of the chat timeout and performs three jobs:
//! inactivity teardown for live pairs, removal of queue entries whose state
//! no longer says `IN_QUEUE`, and pruning of stale active-chat set members.
//! Everything it does is reconciliation; the hot paths never wait for it.

use crate::error::RelayError;
use crate::relay::Relay;
use crate::state::SessionState;
use crate::store::keys;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Pairs broken for inactivity.
    pub inactive_broken: usize,
    /// Queue entries removed because their state was not `IN_QUEUE`.
    pub queue_reconciled: usize,
    /// Active-chat set members without a pair key.
    pub active_pruned: usize,
}

impl SweepReport {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Spawn the sweeper loop. Runs until the shutdown signal fires.
pub fn spawn_sweeper(
    relay: Arc<Relay>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let timeout = relay.config.matching.chat_timeout();
        let tick = Duration::from_secs((timeout.as_secs() / 10).max(1));
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match sweep_once(&relay).await {
                        Ok(report) if !report.is_empty() => {
                            info!(
                                inactive = report.inactive_broken,
                                queue = report.queue_reconciled,
                                pruned = report.active_pruned,
                                "Sweep completed"
                            );
                        }
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "Sweep failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Sweeper stopping");
                    break;
                }
            }
        }
    })
}

/// One reconciliation pass.
pub async fn sweep_once(relay: &Relay) -> Result<SweepReport, RelayError> {
    let mut report = SweepReport::default();
    let timeout_secs = relay.config.matching.chat_timeout().as_secs() as i64;
    let now = chrono::Utc::now().timestamp();

    // Inactivity: walk live pairs via the active-chat set.
    let members: HashSet<i64> = relay
        .store
        .smembers(keys::ACTIVE_CHATS)
        .await?
        .iter()
        .filter_map(|raw| raw.parse().ok())
        .collect();
    let mut handled: HashSet<i64> = HashSet::new();
    for &uid in &members {
        if handled.contains(&uid) {
            continue;
        }
        let Some(partner) = relay.state.partner(uid).await? else {
            // Pair key gone (TTL or teardown race); drop the set entry.
            relay
                .store
                .srem(keys::ACTIVE_CHATS, &uid.to_string())
                .await?;
            report.active_pruned += 1;
            continue;
        };
        // Handle each pair once.
        if uid > partner && members.contains(&partner) {
            continue;
        }
        let last = [
            relay.state.last_activity(uid).await?,
            relay.state.last_activity(partner).await?,
        ]
        .into_iter()
        .flatten()
        .max();
        let idle_too_long = match last {
            Some(last) => now - last > timeout_secs,
            // No activity stamp left means it expired: older than the timeout.
            None => true,
        };
        if idle_too_long {
            debug!(a = uid, b = partner, "Breaking inactive pair");
            if relay.sessions.break_inactive(uid, partner).await? {
                report.inactive_broken += 1;
                handled.insert(partner);
            }
        }
    }

    // Queue hygiene: membership must imply IN_QUEUE.
    for uid in relay.queue.snapshot().await? {
        if relay.state.session(uid).await? != SessionState::InQueue {
            relay.queue.remove(uid).await?;
            report.queue_reconciled += 1;
        }
    }

    Ok(report)
}

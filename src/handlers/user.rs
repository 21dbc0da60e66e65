//! Handlers for the public command surface.

use super::{ban_gate, notify};
use crate::Uid;
use crate::error::{HandlerResult, RelayError};
use crate::matching::{MatchOutcome, RejectReason};
use crate::relay::Relay;
use crate::session::{BreakReason, EndOutcome};
use crate::texts;

/// `/start`
pub async fn start(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    notify(relay, uid, texts::WELCOME).await;
    Ok(())
}

/// `/help`
pub async fn help(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    notify(relay, uid, texts::HELP).await;
    Ok(())
}

/// `/chat` - enter matching.
pub async fn chat(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    if !relay.limiter.check_chat(uid).await? {
        return Err(RelayError::RateLimited);
    }
    run_matching(relay, uid).await
}

/// `/stop` - break the pair or leave the queue.
pub async fn stop(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    match relay.sessions.end_chat(uid, BreakReason::Stopped).await? {
        EndOutcome::EndedChat(_) => {} // session manager already notified
        EndOutcome::LeftQueue => notify(relay, uid, texts::LEFT_QUEUE).await,
        EndOutcome::NotActive => notify(relay, uid, texts::NOT_ACTIVE).await,
    }
    Ok(())
}

/// `/next` - break the pair, then re-enter matching.
pub async fn next(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    if !relay.limiter.check_next(uid).await? {
        return Err(RelayError::RateLimited);
    }
    relay.sessions.end_chat(uid, BreakReason::Next).await?;
    run_matching(relay, uid).await
}

/// Matching entry shared by `/chat` and `/next`.
async fn run_matching(relay: &Relay, uid: Uid) -> HandlerResult {
    match relay.matching.find_partner(uid).await? {
        MatchOutcome::Matched(partner) => relay.sessions.announce_match(uid, partner, false).await,
        MatchOutcome::Queued => {
            let waiting = relay.queue.len().await?;
            notify(relay, uid, &texts::queue_status(waiting)).await;
            Ok(())
        }
        MatchOutcome::Rejected(RejectReason::Toxic) => {
            notify(relay, uid, texts::TOXIC_BLOCKED).await;
            Ok(())
        }
        MatchOutcome::Rejected(RejectReason::AlreadyActive) => {
            Err(RelayError::ConflictState(texts::ALREADY_ACTIVE))
        }
        MatchOutcome::Rejected(RejectReason::QueueFull) => Err(RelayError::QueueFull),
        MatchOutcome::Rejected(RejectReason::Banned) => {
            // Raced with a fresh ban; the gate text covers it.
            match relay.moderation.check_ban(uid).await? {
                Some(record) => notify(relay, uid, &texts::banned_notice(&record)).await,
                None => notify(relay, uid, texts::FORBIDDEN).await,
            }
            Ok(())
        }
    }
}

/// `/report` - report the current partner; admins may name a target id.
pub async fn report(relay: &Relay, uid: Uid, arg: &str) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }

    let arg = arg.trim();
    let target = if arg.is_empty() {
        match relay.state.partner(uid).await? {
            Some(partner) => partner,
            None => {
                notify(relay, uid, texts::REPORT_NO_TARGET).await;
                return Ok(());
            }
        }
    } else {
        // Regular users never learn ids, so a named target is admin-only.
        if !relay.is_admin(uid) {
            return Err(RelayError::Forbidden);
        }
        arg.parse()
            .map_err(|_| RelayError::BadInput("Expected a numeric user id.".into()))?
    };

    use crate::moderation::ReportOutcome;
    match relay.moderation.record_report(target, uid).await? {
        ReportOutcome::Duplicate => notify(relay, uid, texts::REPORT_DUPLICATE).await,
        ReportOutcome::Counted(_) => notify(relay, uid, texts::REPORT_RECEIVED).await,
        ReportOutcome::AutoBanned(record) => {
            relay.sessions.enforce_ban_exit(target).await?;
            notify(relay, target, &texts::banned_notice(&record)).await;
            notify(relay, uid, texts::REPORT_RECEIVED).await;
        }
    }
    Ok(())
}

/// `/profile` - render the stored profile (editing lives elsewhere).
pub async fn profile_info(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    let profile = relay.profiles.profile(uid).await?;
    notify(relay, uid, &format!("Your profile:\n\n{}", profile.card())).await;
    Ok(())
}

/// `/preferences` - render the stored matching preferences.
pub async fn preferences_info(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    let preferences = relay.profiles.preferences(uid).await?;
    notify(
        relay,
        uid,
        &format!("Your preferences:\n\n{}", preferences.summary()),
    )
    .await;
    Ok(())
}

/// `/rating` - render the caller's rating summary.
pub async fn rating_info(relay: &Relay, uid: Uid) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }
    let record = relay.ratings.record(uid).await?;
    notify(relay, uid, &texts::rating_summary(&record)).await;
    Ok(())
}

/// A rating keyboard vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackVote {
    Up,
    Down,
    Skip,
}

impl FeedbackVote {
    /// Parse callback payloads (`rate:up` / `rate:down` / `rate:skip`).
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "rate:up" => Some(Self::Up),
            "rate:down" => Some(Self::Down),
            "rate:skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// Rating keyboard callback: rate the last partner once.
pub async fn feedback(relay: &Relay, uid: Uid, vote: FeedbackVote) -> HandlerResult {
    if ban_gate(relay, uid).await? {
        return Ok(());
    }

    let Some(partner) = relay.ratings.pending_partner(uid).await? else {
        notify(relay, uid, texts::RATE_NOTHING).await;
        return Ok(());
    };

    if vote == FeedbackVote::Skip {
        relay.ratings.clear_pending(uid).await?;
        notify(relay, uid, texts::RATE_SKIPPED).await;
        return Ok(());
    }

    if !relay.ratings.lock_feedback(uid, partner).await? {
        relay.ratings.clear_pending(uid).await?;
        notify(relay, uid, texts::RATE_ALREADY).await;
        return Ok(());
    }

    relay
        .ratings
        .apply_vote(partner, vote == FeedbackVote::Up)
        .await?;
    relay.ratings.clear_pending(uid).await?;
    notify(relay, uid, texts::RATE_THANKS).await;
    Ok(())
}

//! Handlers for the admin command surface.
//!
//! Admin identity is the configured id list; every handler rejects
//! non-admins with `Forbidden` before touching anything.

use super::{flow, notify};
use crate::Uid;
use crate::error::{HandlerResult, RelayError};
use crate::relay::Relay;
use crate::texts;
use crate::transport::Envelope;
use crate::moderation::{BanDuration, BanReason};

fn require_admin(relay: &Relay, uid: Uid) -> Result<(), RelayError> {
    if relay.is_admin(uid) {
        Ok(())
    } else {
        Err(RelayError::Forbidden)
    }
}

fn parse_uid(raw: &str) -> Result<Uid, RelayError> {
    raw.trim()
        .parse()
        .map_err(|_| RelayError::BadInput("Expected a numeric user id.".into()))
}

/// Parse `7d` / `2h 30m` / `perm` into a ban duration.
pub(crate) fn parse_ban_duration(raw: &str) -> Result<BanDuration, RelayError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("perm") || raw.eq_ignore_ascii_case("permanent") {
        return Ok(BanDuration::Permanent);
    }
    humantime::parse_duration(raw)
        .map(BanDuration::Temporary)
        .map_err(|_| {
            RelayError::BadInput("Expected a duration like '2h' or '7d', or 'perm'.".into())
        })
}

fn parse_reason(raw: &str) -> Result<BanReason, RelayError> {
    BanReason::parse(raw.trim()).ok_or_else(|| {
        let all = BanReason::ALL
            .iter()
            .map(|r| r.label())
            .collect::<Vec<_>>()
            .join(", ");
        RelayError::BadInput(format!("Expected a reason: {all}."))
    })
}

/// Apply a ban end to end: record, kick out of chat/queue, notify both.
pub(crate) async fn apply_ban(
    relay: &Relay,
    admin: Uid,
    target: Uid,
    reason: BanReason,
    duration: BanDuration,
) -> HandlerResult {
    let record = relay
        .moderation
        .ban(target, reason, duration, &format!("admin:{admin}"), false)
        .await?;
    relay.sessions.enforce_ban_exit(target).await?;
    notify(relay, target, &texts::banned_notice(&record)).await;
    notify(relay, admin, &texts::ban_applied(target, &record)).await;
    Ok(())
}

/// `/ban` - with arguments `<id> <duration|perm> <reason>` applies
/// directly; bare `/ban` starts the step-by-step flow.
pub async fn ban(relay: &Relay, admin: Uid, args: &str) -> HandlerResult {
    require_admin(relay, admin)?;
    let args = args.trim();
    if args.is_empty() {
        return flow::begin_ban(relay, admin).await;
    }

    let mut parts = args.split_whitespace();
    let (Some(target), Some(duration), Some(reason), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(RelayError::BadInput(
            "Usage: /ban <user id> <duration|perm> <reason>".into(),
        ));
    };
    let target = parse_uid(target)?;
    let duration = parse_ban_duration(duration)?;
    let reason = parse_reason(reason)?;
    apply_ban(relay, admin, target, reason, duration).await
}

/// `/unban <id>` - idempotent.
pub async fn unban(relay: &Relay, admin: Uid, args: &str) -> HandlerResult {
    require_admin(relay, admin)?;
    let target = parse_uid(args)?;
    if relay.moderation.unban(target).await? {
        notify(relay, admin, &format!("User {target} unbanned.")).await;
    } else {
        notify(relay, admin, texts::NOT_BANNED).await;
    }
    Ok(())
}

/// `/warn <id> <reason...>`
pub async fn warn(relay: &Relay, admin: Uid, args: &str) -> HandlerResult {
    require_admin(relay, admin)?;
    let args = args.trim();
    let (target, reason) = args
        .split_once(char::is_whitespace)
        .ok_or_else(|| RelayError::BadInput("Usage: /warn <user id> <reason>".into()))?;
    let target = parse_uid(target)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(RelayError::BadInput("Usage: /warn <user id> <reason>".into()));
    }

    let count = relay
        .moderation
        .warn(target, reason, &format!("admin:{admin}"))
        .await?;
    notify(relay, target, &texts::warned_notice(reason, count)).await;
    notify(
        relay,
        admin,
        &format!("Warning sent to {target} ({count} total)."),
    )
    .await;
    Ok(())
}

/// `/checkban <id>`
pub async fn checkban(relay: &Relay, admin: Uid, args: &str) -> HandlerResult {
    require_admin(relay, admin)?;
    let target = parse_uid(args)?;
    match relay.moderation.check_ban(target).await? {
        Some(record) => notify(relay, admin, &texts::ban_applied(target, &record)).await,
        None => notify(relay, admin, texts::NOT_BANNED).await,
    }
    Ok(())
}

/// `/bannedlist`
pub async fn banned_list(relay: &Relay, admin: Uid) -> HandlerResult {
    require_admin(relay, admin)?;
    let banned = relay.moderation.list_banned().await?;
    if banned.is_empty() {
        notify(relay, admin, "No banned users.").await;
        return Ok(());
    }
    let mut lines = vec![format!("Banned users ({}):", banned.len())];
    for (uid, record) in banned {
        let auto = if record.is_auto_ban { ", auto" } else { "" };
        let scope = if record.is_permanent {
            "permanent".to_string()
        } else {
            record
                .expires_at
                .map(|ts| format!("until {ts}"))
                .unwrap_or_else(|| "temporary".to_string())
        };
        lines.push(format!("{uid} - {} ({scope}{auto})", record.reason.label()));
    }
    notify(relay, admin, &lines.join("\n")).await;
    Ok(())
}

/// `/warninglist`
pub async fn warning_list(relay: &Relay, admin: Uid) -> HandlerResult {
    require_admin(relay, admin)?;
    let warned = relay.moderation.list_warned().await?;
    if warned.is_empty() {
        notify(relay, admin, "No warned users.").await;
        return Ok(());
    }
    let mut lines = vec![format!("Warned users ({}):", warned.len())];
    for (uid, count) in warned {
        lines.push(format!("{uid} - {count} warning(s)"));
    }
    notify(relay, admin, &lines.join("\n")).await;
    Ok(())
}

/// `/forcematch <id> <id>`
pub async fn force_match(relay: &Relay, admin: Uid, args: &str) -> HandlerResult {
    require_admin(relay, admin)?;
    let mut parts = args.split_whitespace();
    let (Some(u), Some(v), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(RelayError::BadInput(
            "Usage: /forcematch <user id> <user id>".into(),
        ));
    };
    let (u, v) = (parse_uid(u)?, parse_uid(v)?);
    relay.sessions.force_match(u, v).await?;
    notify(relay, admin, &format!("Matched {u} with {v}.")).await;
    Ok(())
}

/// Global filter toggles.
pub async fn set_gender_filter(relay: &Relay, admin: Uid, enabled: bool) -> HandlerResult {
    require_admin(relay, admin)?;
    relay.moderation.set_gender_filter(enabled).await?;
    let state = if enabled { "enabled" } else { "disabled" };
    notify(relay, admin, &format!("Gender filter {state}.")).await;
    Ok(())
}

pub async fn set_regional_filter(relay: &Relay, admin: Uid, enabled: bool) -> HandlerResult {
    require_admin(relay, admin)?;
    relay.moderation.set_regional_filter(enabled).await?;
    let state = if enabled { "enabled" } else { "disabled" };
    notify(relay, admin, &format!("Regional filter {state}.")).await;
    Ok(())
}

/// `/matchstatus`
pub async fn match_status(relay: &Relay, admin: Uid) -> HandlerResult {
    require_admin(relay, admin)?;
    let waiting = relay.queue.len().await?;
    let active_chats = relay.store.scard(crate::store::keys::ACTIVE_CHATS).await? / 2;
    let gender = relay.moderation.gender_filter_enabled().await?;
    let regional = relay.moderation.regional_filter_enabled().await?;
    notify(
        relay,
        admin,
        &texts::match_status(waiting, active_chats, gender, regional),
    )
    .await;
    Ok(())
}

/// `/blockmedia <kind>` / `/unblockmedia <kind>`
pub async fn set_media_block(
    relay: &Relay,
    admin: Uid,
    args: &str,
    blocked: bool,
) -> HandlerResult {
    require_admin(relay, admin)?;
    let kind = args.trim().to_ascii_lowercase();
    if !Envelope::KINDS.contains(&kind.as_str()) {
        return Err(RelayError::BadInput(format!(
            "Unknown media kind. One of: {}.",
            Envelope::KINDS.join(", ")
        )));
    }
    if blocked {
        relay.moderation.block_media(&kind).await?;
        notify(relay, admin, &format!("Media kind '{kind}' is now blocked.")).await;
    } else {
        relay.moderation.unblock_media(&kind).await?;
        notify(relay, admin, &format!("Media kind '{kind}' is allowed again.")).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_ban_duration() {
        assert_eq!(parse_ban_duration("perm").unwrap(), BanDuration::Permanent);
        assert_eq!(
            parse_ban_duration("Permanent").unwrap(),
            BanDuration::Permanent
        );
        assert_eq!(
            parse_ban_duration("2h").unwrap(),
            BanDuration::Temporary(Duration::from_secs(7200))
        );
        assert_eq!(
            parse_ban_duration("7d").unwrap(),
            BanDuration::Temporary(Duration::from_secs(7 * 86_400))
        );
        assert!(parse_ban_duration("soon").is_err());
    }

    #[test]
    fn test_parse_reason_lists_options_on_error() {
        assert_eq!(parse_reason("spam").unwrap(), BanReason::Spam);
        let err = parse_reason("bogus").unwrap_err();
        assert!(err.user_notice().unwrap().contains("fake_reports"));
    }
}

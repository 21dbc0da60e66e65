//! User-facing reply texts.
//!
//! Every string the bot sends lives here so wording stays consistent and
//! handlers stay free of literals. Formatting helpers take the typed records
//! they render.

use crate::Uid;
use crate::moderation::BanRecord;
use crate::profile::Profile;
use crate::rating::RatingRecord;

pub const WELCOME: &str = "Welcome! This bot pairs you with a random partner for an \
anonymous one-to-one chat. Send /chat to find a partner, /stop to end, /next to switch. \
Your identity is never shared.";

pub const HELP: &str = "Commands:\n\
/chat - find a chat partner\n\
/stop - end the current chat or leave the queue\n\
/next - end the current chat and find a new partner\n\
/report - report your current partner\n\
/profile - show your profile\n\
/preferences - show your matching preferences\n\
/rating - show your rating\n\
/help - this message";

pub const SEARCHING: &str = "Looking for a partner... you are in the queue. \
I'll message you as soon as someone compatible shows up.";

pub const QUEUE_FULL: &str = "The waiting queue is full right now. Please try again in a few minutes.";

pub const ALREADY_ACTIVE: &str = "You are already in a chat or waiting in the queue. \
Send /stop first.";

pub const TOXIC_BLOCKED: &str = "You cannot start chats: too many partners rated you negatively. \
Ratings recover as you receive positive feedback.";

pub const CHAT_ENDED_BY_YOU: &str = "You ended the chat.";
pub const PARTNER_LEFT: &str = "Your partner left the chat.";
pub const CHAT_ENDED_INACTIVITY: &str = "The chat ended due to inactivity.";
pub const PARTNER_UNREACHABLE: &str =
    "Your partner can no longer be reached, so the chat was ended.";
pub const LEFT_QUEUE: &str = "You left the waiting queue.";
pub const NOT_ACTIVE: &str = "You are not in a chat or in the queue. Send /chat to start.";
pub const NOT_IN_CHAT: &str = "You are not in a chat right now. Send /chat to find a partner.";

pub const RATE_PROMPT: &str = "How was your partner?";
pub const RATE_THANKS: &str = "Thanks, your rating was recorded.";
pub const RATE_SKIPPED: &str = "Okay, no rating recorded.";
pub const RATE_ALREADY: &str = "You already rated this partner.";
pub const RATE_NOTHING: &str = "There is nobody to rate right now.";

pub const REPORT_RECEIVED: &str = "Thanks, your report was recorded.";
pub const REPORT_DUPLICATE: &str = "You already reported this user recently.";
pub const REPORT_NO_TARGET: &str = "You have nobody to report. Reports apply to your current partner.";

pub const MEDIA_BLOCKED: &str = "This kind of media is currently disabled.";
pub const TERM_BLOCKED: &str = "Your message was not delivered: it contains blocked content.";
pub const RATE_LIMITED: &str = "Slow down a little and try again in a minute.";
pub const SERVICE_UNAVAILABLE: &str = "The service is temporarily unavailable. Please try again shortly.";
pub const FORBIDDEN: &str = "You are not allowed to do that.";
pub const BAD_INPUT: &str = "I could not understand that.";
pub const UNSUPPORTED_MESSAGE: &str = "That message type cannot be relayed.";

pub const SPECIAL_MATCH: &str = "✨ A special match was made for you!";
pub const NOT_BANNED: &str = "That user is not banned.";

// =============================================================================
// Formatting helpers
// =============================================================================

/// The profile card shown to a freshly matched user. Never includes the
/// partner's id or handle.
pub fn match_found(partner: &Profile) -> String {
    format!(
        "Partner found!\n\n{}\n\nSay hi - everything you send is relayed anonymously. \
         /next for a new partner, /stop to end.",
        partner.card()
    )
}

pub fn queue_status(waiting: usize) -> String {
    format!("{SEARCHING}\nCurrently waiting: {waiting}")
}

pub fn banned_notice(record: &BanRecord) -> String {
    let until = match record.expires_at {
        Some(ts) if !record.is_permanent => format!("until {}", format_ts(ts)),
        _ => "permanently".to_string(),
    };
    format!(
        "You are banned {} (reason: {}). You cannot use the bot while banned.",
        until,
        record.reason.label()
    )
}

pub fn warned_notice(reason: &str, count: i64) -> String {
    format!(
        "⚠️ You received a warning: {reason}. Warnings so far: {count}. \
         Repeated violations lead to a ban."
    )
}

pub fn rating_summary(record: &RatingRecord) -> String {
    format!(
        "Your rating: {:.0}%\n👍 {}  👎 {}\nChats so far: {}",
        record.score(),
        record.positive,
        record.negative,
        record.total_chats
    )
}

pub fn match_status(waiting: usize, active_chats: usize, gender: bool, regional: bool) -> String {
    fn on_off(flag: bool) -> &'static str {
        if flag { "on" } else { "off" }
    }
    format!(
        "Waiting in queue: {waiting}\nActive chats: {active_chats}\n\
         Gender filter: {}\nRegional filter: {}",
        on_off(gender),
        on_off(regional)
    )
}

pub fn ban_applied(target: Uid, record: &BanRecord) -> String {
    let scope = if record.is_permanent {
        "permanently".to_string()
    } else {
        match record.expires_at {
            Some(ts) => format!("until {}", format_ts(ts)),
            None => "temporarily".to_string(),
        }
    };
    format!("User {target} banned {scope} (reason: {})", record.reason.label())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

// Admin conversation prompts.
pub const FLOW_BAN_TARGET: &str = "Ban flow started. Send the numeric user id to ban (or 'cancel').";
pub const FLOW_BAN_REASON: &str =
    "Reason? One of: nudity, spam, abuse, fake_reports, harassment (or 'cancel').";
pub const FLOW_BAN_DURATION: &str =
    "Duration? e.g. '2h', '7d', or 'perm' for permanent (or 'cancel').";
pub const FLOW_CANCELLED: &str = "Flow cancelled.";

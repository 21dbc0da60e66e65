//! Store key layout.
//!
//! Every key the relay touches is built here so the layout stays auditable
//! in one place. Per-user keys are `prefix:{uid}`; global keys are bare
//! constants.

use crate::Uid;

/// FIFO of waiting user ids.
pub const QUEUE: &str = "queue:waiting";

/// Set of currently banned user ids (listing; details live per user).
pub const BANNED_SET: &str = "bot:banned_users";

/// Set of user ids that have received at least one warning.
pub const WARNING_SET: &str = "bot:warning_list";

/// Set of user ids currently in a chat. Maintained by the atomic pair
/// scripts so the sweeper can enumerate live pairs without scanning.
pub const ACTIVE_CHATS: &str = "bot:active_chats";

/// Set of globally blocked media kinds (envelope kind strings).
pub const BLOCKED_MEDIA: &str = "bot:blocked_media";

/// Global toggle: "0" disables per-user gender preferences. Absent = on.
pub const GENDER_FILTER_ENABLED: &str = "matching:gender_filter_enabled";

/// Global toggle: "0" disables per-user country preferences. Absent = on.
pub const REGIONAL_FILTER_ENABLED: &str = "matching:regional_filter_enabled";

/// Session state (`IN_QUEUE` / `IN_CHAT`; absent = idle).
pub fn state(uid: Uid) -> String {
    format!("state:{uid}")
}

/// Partner id while in a chat. Always written symmetrically.
pub fn pair(uid: Uid) -> String {
    format!("pair:{uid}")
}

/// Unix-seconds timestamp of the user's last relayed activity.
pub fn activity(uid: Uid) -> String {
    format!("activity:{uid}")
}

/// Opaque profile hash (gender, country, nickname). Read-only here.
pub fn profile(uid: Uid) -> String {
    format!("profile:{uid}")
}

/// Opaque preferences hash (gender_filter, country_filter). Read-only here.
pub fn preferences(uid: Uid) -> String {
    format!("preferences:{uid}")
}

/// Rating counters hash (positive, negative, total_chats).
pub fn rating(uid: Uid) -> String {
    format!("rating:{uid}")
}

/// Ban record hash; carries the ban TTL for temporary bans.
pub fn ban(uid: Uid) -> String {
    format!("ban:{uid}")
}

/// List of warning entries for a user.
pub fn warnings(uid: Uid) -> String {
    format!("warnings:{uid}")
}

/// Warning counter for a user.
pub fn warning_count(uid: Uid) -> String {
    format!("warning_count:{uid}")
}

/// Report counter for a user.
pub fn report_count(uid: Uid) -> String {
    format!("stats:{uid}:report_count")
}

/// Tombstone preventing `rater` from rating `rated` twice in 24 h.
pub fn feedback(rater: Uid, rated: Uid) -> String {
    format!("feedback:{rater}:{rated}")
}

/// Short-lived pointer to the partner a user may still rate.
pub fn pending_feedback(uid: Uid) -> String {
    format!("pending_feedback:{uid}")
}

/// Tombstone preventing `by` from reporting `target` twice in 24 h.
pub fn report_lock(by: Uid, target: Uid) -> String {
    format!("report:{by}:{target}")
}

/// Serialized multi-step admin conversation state.
pub fn adminflow(admin: Uid) -> String {
    format!("adminflow:{admin}")
}

/// Fixed-window rate-limit counter for one (operation, user) pair.
pub fn ratelimit(op: &str, uid: Uid) -> String {
    format!("ratelimit:{op}:{uid}")
}

//! Default value functions for configuration.

pub fn default_store_url() -> String {
    "redis://127.0.0.1/".to_string()
}

// =============================================================================
// Matching Defaults
// =============================================================================

pub fn default_chat_timeout_secs() -> u64 {
    600
}

pub fn default_max_queue_size() -> usize {
    1000
}

// =============================================================================
// Rate-Limit Defaults
// =============================================================================

pub fn default_messages_per_minute() -> u32 {
    20
}

pub fn default_chat_per_minute() -> u32 {
    6
}

pub fn default_next_per_minute() -> u32 {
    3
}

// =============================================================================
// Moderation Defaults
// =============================================================================

pub fn default_auto_ban_threshold() -> i64 {
    5
}

pub fn default_auto_ban_days() -> i64 {
    7
}

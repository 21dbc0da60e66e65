//! Transport seam between the relay core and the messaging platform.
//!
//! The core only ever talks to [`Transport`]; the production implementation
//! lives in [`telegram`]. Relayed content travels as an opaque [`Envelope`]
//! that preserves type and payload, so relaying is a fresh send (copy
//! semantics) and the original sender identity is never attached.

pub mod telegram;

use crate::Uid;
use async_trait::async_trait;
use thiserror::Error;

/// Transport failures, classified the way the router reacts to them.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Worth one retry (network hiccup, flood-wait).
    #[error("transient transport error: {0}")]
    Transient(String),

    /// The recipient can no longer be reached (blocked the bot, deactivated
    /// account). The router breaks the pair on this edge.
    #[error("recipient unreachable")]
    Unreachable,

    /// The recipient id was never valid.
    #[error("invalid recipient")]
    InvalidRecipient,
}

/// Outgoing side of the messaging platform.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a plain text notice.
    async fn send_text(&self, to: Uid, text: &str) -> Result<(), TransportError>;

    /// Send a text with the rating keyboard attached (👍 / 👎 / skip).
    async fn send_rating_prompt(&self, to: Uid, text: &str) -> Result<(), TransportError>;

    /// Relay an envelope, preserving its type and payload.
    async fn send_envelope(&self, to: Uid, envelope: &Envelope) -> Result<(), TransportError>;
}

/// An opaque relayable message.
///
/// File-backed kinds carry the platform file id (relaying by file id is a
/// fresh upload reference, not a forward). Captions ride along unmodified.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Text { text: String },
    Photo { file_id: String, caption: Option<String> },
    Video { file_id: String, caption: Option<String> },
    Sticker { file_id: String },
    Voice { file_id: String, caption: Option<String> },
    Audio { file_id: String, caption: Option<String> },
    Animation { file_id: String, caption: Option<String> },
    Document { file_id: String, caption: Option<String> },
    VideoNote { file_id: String },
    Location { latitude: f64, longitude: f64 },
    Contact { phone_number: String, first_name: String, last_name: Option<String> },
}

impl Envelope {
    /// Every kind string, for validating admin media-block input.
    pub const KINDS: &'static [&'static str] = &[
        "text",
        "photo",
        "video",
        "sticker",
        "voice",
        "audio",
        "animation",
        "document",
        "video_note",
        "location",
        "contact",
    ];

    /// Stable kind discriminator, used for the blocked-media set.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
            Self::Sticker { .. } => "sticker",
            Self::Voice { .. } => "voice",
            Self::Audio { .. } => "audio",
            Self::Animation { .. } => "animation",
            Self::Document { .. } => "document",
            Self::VideoNote { .. } => "video_note",
            Self::Location { .. } => "location",
            Self::Contact { .. } => "contact",
        }
    }

    /// The human-visible text of this envelope (body or caption), if any.
    /// This is what the content filter scans.
    pub fn visible_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Photo { caption, .. }
            | Self::Video { caption, .. }
            | Self::Voice { caption, .. }
            | Self::Audio { caption, .. }
            | Self::Animation { caption, .. }
            | Self::Document { caption, .. } => caption.as_deref(),
            Self::Sticker { .. } | Self::VideoNote { .. } | Self::Location { .. } => None,
            Self::Contact { .. } => None,
        }
    }
}

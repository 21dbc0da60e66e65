//! Telegram transport implementation over teloxide.
//!
//! Relayed media is re-sent by file id: Telegram treats that as a brand new
//! message from the bot, so the receiving side never sees who produced the
//! original. `forward_message` is deliberately never used.

use super::{Envelope, Transport, TransportError};
use crate::Uid;
use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message};

/// Production transport backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn classify(err: RequestError) -> TransportError {
    match err {
        RequestError::Api(ApiError::BotBlocked) => TransportError::Unreachable,
        RequestError::Api(ApiError::UserDeactivated) => TransportError::Unreachable,
        RequestError::Api(ApiError::ChatNotFound) => TransportError::InvalidRecipient,
        RequestError::Network(err) => TransportError::Transient(err.to_string()),
        RequestError::Io(err) => TransportError::Transient(err.to_string()),
        RequestError::RetryAfter(after) => {
            TransportError::Transient(format!("retry after {after:?}"))
        }
        other => TransportError::Transient(other.to_string()),
    }
}

fn file(file_id: &str) -> InputFile {
    InputFile::file_id(file_id.to_string())
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, to: Uid, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(ChatId(to), text)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn send_rating_prompt(&self, to: Uid, text: &str) -> Result<(), TransportError> {
        let keyboard = InlineKeyboardMarkup::new([
            vec![
                InlineKeyboardButton::callback("👍", "rate:up"),
                InlineKeyboardButton::callback("👎", "rate:down"),
            ],
            vec![InlineKeyboardButton::callback("Skip", "rate:skip")],
        ]);
        self.bot
            .send_message(ChatId(to), text)
            .reply_markup(keyboard)
            .await
            .map(|_| ())
            .map_err(classify)
    }

    async fn send_envelope(&self, to: Uid, envelope: &Envelope) -> Result<(), TransportError> {
        let chat = ChatId(to);
        let result = match envelope {
            Envelope::Text { text } => self.bot.send_message(chat, text).await.map(|_| ()),
            Envelope::Photo { file_id, caption } => {
                let mut request = self.bot.send_photo(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::Video { file_id, caption } => {
                let mut request = self.bot.send_video(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::Sticker { file_id } => {
                self.bot.send_sticker(chat, file(file_id)).await.map(|_| ())
            }
            Envelope::Voice { file_id, caption } => {
                let mut request = self.bot.send_voice(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::Audio { file_id, caption } => {
                let mut request = self.bot.send_audio(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::Animation { file_id, caption } => {
                let mut request = self.bot.send_animation(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::Document { file_id, caption } => {
                let mut request = self.bot.send_document(chat, file(file_id));
                if let Some(caption) = caption {
                    request = request.caption(caption.clone());
                }
                request.await.map(|_| ())
            }
            Envelope::VideoNote { file_id } => {
                self.bot
                    .send_video_note(chat, file(file_id))
                    .await
                    .map(|_| ())
            }
            Envelope::Location {
                latitude,
                longitude,
            } => {
                self.bot
                    .send_location(chat, *latitude, *longitude)
                    .await
                    .map(|_| ())
            }
            Envelope::Contact {
                phone_number,
                first_name,
                last_name,
            } => {
                let mut request =
                    self.bot
                        .send_contact(chat, phone_number.clone(), first_name.clone());
                if let Some(last_name) = last_name {
                    request = request.last_name(last_name.clone());
                }
                request.await.map(|_| ())
            }
        };
        result.map_err(classify)
    }
}

/// Convert an incoming Telegram message into a relayable envelope.
///
/// Returns `None` for content the relay does not carry (polls, invoices,
/// service messages, ...).
pub fn envelope_from_message(msg: &Message) -> Option<Envelope> {
    if let Some(text) = msg.text() {
        return Some(Envelope::Text {
            text: text.to_string(),
        });
    }
    let caption = msg.caption().map(str::to_string);

    if let Some(sizes) = msg.photo() {
        // Telegram sends every thumbnail size; the last one is the original.
        let best = sizes.last()?;
        return Some(Envelope::Photo {
            file_id: best.file.id.clone(),
            caption,
        });
    }
    if let Some(video) = msg.video() {
        return Some(Envelope::Video {
            file_id: video.file.id.clone(),
            caption,
        });
    }
    if let Some(sticker) = msg.sticker() {
        return Some(Envelope::Sticker {
            file_id: sticker.file.id.clone(),
        });
    }
    if let Some(voice) = msg.voice() {
        return Some(Envelope::Voice {
            file_id: voice.file.id.clone(),
            caption,
        });
    }
    if let Some(audio) = msg.audio() {
        return Some(Envelope::Audio {
            file_id: audio.file.id.clone(),
            caption,
        });
    }
    if let Some(animation) = msg.animation() {
        return Some(Envelope::Animation {
            file_id: animation.file.id.clone(),
            caption,
        });
    }
    if let Some(document) = msg.document() {
        return Some(Envelope::Document {
            file_id: document.file.id.clone(),
            caption,
        });
    }
    if let Some(note) = msg.video_note() {
        return Some(Envelope::VideoNote {
            file_id: note.file.id.clone(),
        });
    }
    if let Some(location) = msg.location() {
        return Some(Envelope::Location {
            latitude: location.latitude,
            longitude: location.longitude,
        });
    }
    if let Some(contact) = msg.contact() {
        return Some(Envelope::Contact {
            phone_number: contact.phone_number.clone(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
        });
    }
    None
}

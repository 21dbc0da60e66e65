//! The update dispatcher.
//!
//! Branch order matters: admin commands, then user commands, then plain
//! content. Plain text from an admin with a conversation in progress feeds
//! the flow; everything else goes to the router. Callback queries carry
//! rating votes. Group chats are ignored entirely - the relay is a private
//! one-to-one surface.

use super::commands::{AdminCommand, UserCommand};
use crate::Uid;
use crate::error::RelayError;
use crate::handlers::{admin, flow, user};
use crate::relay::Relay;
use crate::texts;
use crate::transport::telegram::envelope_from_message;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::Message;
use tracing::{error, warn};

/// Build and run the dispatcher until shutdown.
pub async fn run(relay: Arc<Relay>, bot: Bot) {
    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<AdminCommand>()
                        .endpoint(on_admin_command),
                )
                .branch(
                    dptree::entry()
                        .filter_command::<UserCommand>()
                        .endpoint(on_user_command),
                )
                .branch(dptree::endpoint(on_message)),
        )
        .branch(Update::filter_callback_query().endpoint(on_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn sender(msg: &Message) -> Option<Uid> {
    if !msg.chat.is_private() {
        return None;
    }
    msg.from.as_ref().map(|user| user.id.0 as Uid)
}

/// Map a handler error onto its single user notice, log the rest.
async fn report_error(relay: &Relay, uid: Uid, err: RelayError) {
    match &err {
        RelayError::Store(store_err) => {
            error!(uid = uid, error = %store_err, "Store unavailable")
        }
        other => warn!(uid = uid, code = other.error_code(), error = %other, "Command failed"),
    }
    if let Some(notice) = err.user_notice() {
        if let Err(send_err) = relay.transport.send_text(uid, &notice).await {
            warn!(uid = uid, error = %send_err, "Error notice delivery failed");
        }
    }
}

async fn on_user_command(
    msg: Message,
    cmd: UserCommand,
    relay: Arc<Relay>,
) -> ResponseResult<()> {
    let Some(uid) = sender(&msg) else {
        return Ok(());
    };
    let result = match &cmd {
        UserCommand::Start => user::start(&relay, uid).await,
        UserCommand::Chat => user::chat(&relay, uid).await,
        UserCommand::Stop => user::stop(&relay, uid).await,
        UserCommand::Next => user::next(&relay, uid).await,
        UserCommand::Help => user::help(&relay, uid).await,
        UserCommand::Report(arg) => user::report(&relay, uid, arg).await,
        UserCommand::Profile => user::profile_info(&relay, uid).await,
        UserCommand::Preferences => user::preferences_info(&relay, uid).await,
        UserCommand::Rating => user::rating_info(&relay, uid).await,
    };
    if let Err(err) = result {
        report_error(&relay, uid, err).await;
    }
    Ok(())
}

async fn on_admin_command(
    msg: Message,
    cmd: AdminCommand,
    relay: Arc<Relay>,
) -> ResponseResult<()> {
    let Some(uid) = sender(&msg) else {
        return Ok(());
    };
    let result = match &cmd {
        AdminCommand::Ban(args) => admin::ban(&relay, uid, args).await,
        AdminCommand::Unban(args) => admin::unban(&relay, uid, args).await,
        AdminCommand::Warn(args) => admin::warn(&relay, uid, args).await,
        AdminCommand::Checkban(args) => admin::checkban(&relay, uid, args).await,
        AdminCommand::Bannedlist => admin::banned_list(&relay, uid).await,
        AdminCommand::Warninglist => admin::warning_list(&relay, uid).await,
        AdminCommand::Forcematch(args) => admin::force_match(&relay, uid, args).await,
        AdminCommand::Enablegender => admin::set_gender_filter(&relay, uid, true).await,
        AdminCommand::Disablegender => admin::set_gender_filter(&relay, uid, false).await,
        AdminCommand::Enableregional => admin::set_regional_filter(&relay, uid, true).await,
        AdminCommand::Disableregional => admin::set_regional_filter(&relay, uid, false).await,
        AdminCommand::Matchstatus => admin::match_status(&relay, uid).await,
        AdminCommand::Blockmedia(args) => admin::set_media_block(&relay, uid, args, true).await,
        AdminCommand::Unblockmedia(args) => {
            admin::set_media_block(&relay, uid, args, false).await
        }
    };
    if let Err(err) = result {
        report_error(&relay, uid, err).await;
    }
    Ok(())
}

async fn on_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    let Some(uid) = sender(&msg) else {
        return Ok(());
    };

    // Plain text from an admin mid-conversation belongs to the flow.
    if relay.is_admin(uid) {
        match flow::is_active(&relay, uid).await {
            Ok(true) => {
                if let Some(text) = msg.text() {
                    if let Err(err) = flow::on_text(&relay, uid, text).await {
                        report_error(&relay, uid, err).await;
                    }
                    return Ok(());
                }
            }
            Ok(false) => {}
            Err(err) => {
                report_error(&relay, uid, err).await;
                return Ok(());
            }
        }
    }

    match envelope_from_message(&msg) {
        Some(envelope) => {
            if let Err(err) = relay.router.relay(uid, &envelope).await {
                report_error(&relay, uid, err).await;
            }
        }
        None => {
            let _ = relay
                .transport
                .send_text(uid, texts::UNSUPPORTED_MESSAGE)
                .await;
        }
    }
    Ok(())
}

async fn on_callback(bot: Bot, query: CallbackQuery, relay: Arc<Relay>) -> ResponseResult<()> {
    // Stop the client-side spinner regardless of the outcome.
    bot.answer_callback_query(query.id.clone()).await?;

    let uid = query.from.id.0 as Uid;
    let Some(vote) = query.data.as_deref().and_then(user::FeedbackVote::parse) else {
        return Ok(());
    };
    if let Err(err) = user::feedback(&relay, uid, vote).await {
        report_error(&relay, uid, err).await;
    }
    Ok(())
}

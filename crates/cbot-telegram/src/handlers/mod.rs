//! Telegram update handlers.
//!
//! - member joins are turned into welcome notifications
//! - prefixed text goes through the command dispatcher
//! - everything else (including other bots) is ignored

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod commands;
mod members;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(joined) = msg.new_chat_members() {
        return members::handle_new_members(&msg, joined, &state).await;
    }

    let Some(user) = msg.from() else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with(state.dispatcher.prefix()) {
            return commands::handle_command(bot, msg, state).await;
        }
    }

    Ok(())
}

use std::sync::Arc;

use teloxide::{prelude::*, types::ChatMemberKind};
use tracing::{debug, info, warn};

use cbot_core::{
    dispatch::{parse_command, BotCommand, CommandRequest, Outcome},
    domain::{ChatId, UserId},
    formatting::render_outcome,
    security::{authorization_level, AuthLevel},
};

use crate::router::AppState;

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let cfg = &state.cfg;

    // Only privileged commands from non-allowlisted users cost a getChatMember call.
    let role = if needs_role_lookup(text, state.dispatcher.prefix())
        && !cfg.console_operators.contains(&user_id)
    {
        admin_title(&bot, msg.chat.id, user.id).await
    } else {
        None
    };
    let auth = authorization_level(
        Some(user_id),
        role.as_deref(),
        &cfg.console_operators,
        &cfg.console_role,
    );

    let outcome = state
        .dispatcher
        .dispatch(&CommandRequest {
            text: text.to_string(),
            auth,
        })
        .await;
    log_outcome(user_id, &outcome);

    let Some(reply) = render_outcome(&outcome, user_id.0, &user.full_name(), &cfg.console_role)
    else {
        return Ok(());
    };
    let max = state.messenger.capabilities().max_message_len;
    if let Err(e) = state
        .messenger
        .send_html(ChatId(msg.chat.id.0), &reply.to_html(max / 4))
        .await
    {
        warn!(error = %e, chat_id = msg.chat.id.0, "failed to send command reply");
    }
    Ok(())
}

fn needs_role_lookup(text: &str, prefix: char) -> bool {
    parse_command(text, prefix)
        .and_then(|p| BotCommand::lookup(&p.name))
        .is_some_and(|c| c.required_level() > AuthLevel::Member)
}

/// The admin custom title doubles as the console role.
async fn admin_title(
    bot: &Bot,
    chat: teloxide::types::ChatId,
    user: teloxide::types::UserId,
) -> Option<String> {
    match bot.get_chat_member(chat, user).await {
        Ok(member) => match member.kind {
            ChatMemberKind::Owner(owner) => owner.custom_title,
            ChatMemberKind::Administrator(admin) => admin.custom_title,
            _ => None,
        },
        Err(e) => {
            debug!(error = %e, "get_chat_member failed");
            None
        }
    }
}

fn log_outcome(user_id: UserId, outcome: &Outcome) {
    match outcome {
        Outcome::Success { payload, recovered } => info!(
            user_id = user_id.0,
            payload_len = payload.len(),
            recovered,
            "console command sent"
        ),
        Outcome::Failed { payload, reason } => warn!(
            user_id = user_id.0,
            payload_len = payload.len(),
            %reason,
            "console command failed"
        ),
        other => debug!(user_id = user_id.0, outcome = ?other, "command handled"),
    }
}

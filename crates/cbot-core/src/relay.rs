//! Lifecycle event relay: welcome messages, deletion logs, console logs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    config::Config,
    console::ConsoleEvent,
    domain::ChatId,
    formatting::{escape_html, mention_html, truncate_text, Notification, Tone},
    messaging::MessagingPort,
    Result,
};

/// A user as seen by the gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub user_id: i64,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A message that was removed, if the gateway still has it cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedMessage {
    pub content: String,
    pub author: Member,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    MemberJoined {
        member: Member,
        chat_title: String,
        account_created: Option<DateTime<Utc>>,
        joined_at: DateTime<Utc>,
    },
    MessageDeleted {
        channel_name: String,
        message: Option<DeletedMessage>,
    },
    Console(ConsoleEvent),
}

#[derive(Clone, Debug, Default)]
pub struct RelayTargets {
    pub welcome_chat: Option<ChatId>,
    pub deletion_log_chat: Option<ChatId>,
    pub console_log_chat: Option<ChatId>,
    pub ignored_channels: Vec<String>,
}

impl RelayTargets {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            welcome_chat: cfg.welcome_chat,
            deletion_log_chat: cfg.deletion_log_chat,
            console_log_chat: cfg.console_log_chat,
            ignored_channels: cfg.relay_ignored_channels.clone(),
        }
    }
}

/// Formats lifecycle events and forwards them to fixed notification chats.
pub struct EventRelay {
    targets: RelayTargets,
    messenger: Arc<dyn MessagingPort>,
}

impl EventRelay {
    pub fn new(targets: RelayTargets, messenger: Arc<dyn MessagingPort>) -> Self {
        Self { targets, messenger }
    }

    /// Returns `Ok(false)` when the event has no destination or is filtered out.
    pub async fn relay(&self, event: &LifecycleEvent) -> Result<bool> {
        let Some((chat, notification)) = self.route(event) else {
            debug!(?event, "relay: no destination");
            return Ok(false);
        };
        let max = self.messenger.capabilities().max_message_len;
        self.messenger
            .send_html(chat, &notification.to_html(max / 4))
            .await?;
        Ok(true)
    }

    /// Best-effort variant used from gateway handlers.
    pub async fn relay_logged(&self, event: &LifecycleEvent) {
        if let Err(e) = self.relay(event).await {
            warn!(error = %e, "relay failed");
        }
    }

    fn route(&self, event: &LifecycleEvent) -> Option<(ChatId, Notification)> {
        match event {
            LifecycleEvent::MemberJoined {
                member,
                chat_title,
                account_created,
                joined_at,
            } => {
                let chat = self.targets.welcome_chat?;
                let mut n = Notification::new(
                    Tone::Success,
                    format!(
                        "Hello {}, welcome to {}!",
                        mention_html(member.user_id, &member.display_name),
                        escape_html(chat_title)
                    ),
                )
                .title("Welcome!")
                .thumbnail(member.avatar_url.clone());
                if let Some(created) = account_created {
                    n = n.field("Account Created", format_long(created));
                }
                n = n
                    .field("Joined Server", format_long(joined_at))
                    .footer("We're glad to have you here!")
                    .at(*joined_at);
                Some((chat, n))
            }
            LifecycleEvent::MessageDeleted {
                channel_name,
                message,
            } => {
                let chat = self.targets.deletion_log_chat?;
                if self.targets.ignored_channels.iter().any(|c| c == channel_name) {
                    return None;
                }
                let n = match message {
                    Some(m) => Notification::new(
                        Tone::Error,
                        format!("A message was deleted in <code>{}</code>", escape_html(channel_name)),
                    )
                    .field("Content", m.content.clone())
                    .field("Author", m.author.display_name.clone())
                    .thumbnail(m.author.avatar_url.clone()),
                    None => Notification::new(
                        Tone::Error,
                        format!(
                            "A message was deleted in <code>{}</code> but the message content was unable to be retrieved. Check the Audit Log for more info.",
                            escape_html(channel_name)
                        ),
                    ),
                };
                Some((chat, n.title("Message Deleted")))
            }
            LifecycleEvent::Console(ev) => {
                let chat = self.targets.console_log_chat?;
                let data = match &ev.data {
                    serde_json::Value::Null => String::new(),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let n = Notification::new(
                    Tone::Info,
                    format!("<code>{}</code>", escape_html(&ev.label())),
                )
                .title("Console");
                let n = if data.is_empty() {
                    n
                } else {
                    n.field("Data", truncate_text(&data, 500))
                };
                Some((chat, n))
            }
        }
    }
}

fn format_long(ts: &DateTime<Utc>) -> String {
    ts.format("%A, %B %-d, %Y %-I:%M %p").to_string()
}

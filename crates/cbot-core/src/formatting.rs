//! Notification model and Telegram HTML rendering.

use chrono::{DateTime, Utc};

use crate::dispatch::Outcome;

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

/// Color of a notification; Telegram has no embed colors, so it becomes a marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    fn marker(self) -> &'static str {
        match self {
            Tone::Info => "🔵",
            Tone::Success => "🟢",
            Tone::Warning => "🟠",
            Tone::Error => "🔴",
        }
    }
}

/// Embed-like message. Text fields hold plain text; `description_html` is
/// already-rendered HTML (mentions, inline code).
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub tone: Tone,
    pub title: Option<String>,
    pub description_html: String,
    pub fields: Vec<(String, String)>,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(tone: Tone, description_html: impl Into<String>) -> Self {
        Self {
            tone,
            title: None,
            description_html: description_html.into(),
            fields: Vec::new(),
            thumbnail_url: None,
            footer: None,
            timestamp: Utc::now(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Render as Telegram HTML, capped at `max_len` characters of field text.
    pub fn to_html(&self, max_len: usize) -> String {
        let mut out = String::new();
        match &self.title {
            Some(t) => out.push_str(&format!("{} <b>{}</b>\n", self.tone.marker(), escape_html(t))),
            None => out.push_str(&format!("{} ", self.tone.marker())),
        }
        out.push_str(&self.description_html);

        for (name, value) in &self.fields {
            out.push_str(&format!(
                "\n<b>{}:</b> {}",
                escape_html(name),
                escape_html(&truncate_text(value, max_len))
            ));
        }
        if let Some(url) = &self.thumbnail_url {
            out.push_str(&format!("\n<a href=\"{}\">avatar</a>", escape_html(url)));
        }

        out.push_str("\n<i>");
        if let Some(footer) = &self.footer {
            out.push_str(&escape_html(footer));
            out.push_str(" • ");
        }
        out.push_str(&self.timestamp.format("%Y-%m-%d %H:%M UTC").to_string());
        out.push_str("</i>");
        out
    }
}

/// HTML mention for a chat user.
pub fn mention_html(user_id: i64, display_name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={user_id}\">{}</a>",
        escape_html(display_name)
    )
}

/// Reply for a dispatch outcome; `None` means stay silent.
pub fn render_outcome(
    outcome: &Outcome,
    user_id: i64,
    display_name: &str,
    console_role: &str,
) -> Option<Notification> {
    let author_html = mention_html(user_id, display_name);
    let n = match outcome {
        Outcome::Ignored => return None,
        Outcome::Pong => Notification::new(Tone::Info, format!("It works, {author_html}!")),
        Outcome::Unknown { .. } => Notification::new(Tone::Error, "Unknown command."),
        Outcome::Unauthorized { .. } => Notification::new(
            Tone::Error,
            format!("You don't have {} access!", escape_html(console_role)),
        ),
        Outcome::Usage { command } => Notification::new(
            Tone::Warning,
            format!("Usage: <code>{}</code> &lt;console command&gt;", escape_html(command)),
        ),
        Outcome::Success {
            payload,
            recovered: false,
        } => Notification::new(
            Tone::Info,
            format!("Sent command <code>{}</code> successfully!", escape_html(payload)),
        ),
        Outcome::Success {
            payload,
            recovered: true,
        } => Notification::new(
            Tone::Success,
            format!(
                "Server connected successfully. Sent command <code>{}</code>!",
                escape_html(payload)
            ),
        ),
        Outcome::Failed { reason, .. } if reason == crate::dispatch::SERVER_UNAVAILABLE => {
            Notification::new(Tone::Error, "Server offline or error occurred.")
        }
        Outcome::Failed { reason, .. } => Notification::new(
            Tone::Error,
            format!(
                "Error executing command after reconnection: {}",
                escape_html(reason)
            ),
        ),
    };
    Some(n.footer(display_name))
}

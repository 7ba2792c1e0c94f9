use crate::security::AuthLevel;

/// Chat commands the bot understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BotCommand {
    /// Liveness check, answered without touching the console.
    Test,
    /// Run the rest of the message on the remote console.
    Cmd,
}

const COMMANDS: &[(&str, BotCommand)] = &[("test", BotCommand::Test), ("cmd", BotCommand::Cmd)];

impl BotCommand {
    pub fn lookup(name: &str) -> Option<Self> {
        COMMANDS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }

    pub fn name(self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, c)| *c == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }

    pub fn required_level(self) -> AuthLevel {
        match self {
            BotCommand::Test => AuthLevel::Member,
            BotCommand::Cmd => AuthLevel::ConsoleOperator,
        }
    }

    pub fn needs_console(self) -> bool {
        matches!(self, BotCommand::Cmd)
    }
}

/// A prefixed chat message split into command name and argument text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    /// Lowercased command name (may be empty for a bare prefix).
    pub name: String,
    /// Everything after the name, leading whitespace stripped, otherwise verbatim.
    pub args: &'a str,
}

/// Parse `text` if it starts with `prefix`; `None` means "not for us".
pub fn parse_command(text: &str, prefix: char) -> Option<ParsedCommand<'_>> {
    let body = text.strip_prefix(prefix)?;
    let (name, rest) = match body.find(char::is_whitespace) {
        Some(i) => body.split_at(i),
        None => (body, ""),
    };
    Some(ParsedCommand {
        name: name.to_lowercase(),
        args: rest.trim_start(),
    })
}

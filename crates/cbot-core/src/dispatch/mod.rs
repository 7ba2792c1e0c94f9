//! Chat command dispatcher: parse, authorize, run on the console, recover once.

pub mod command;

use std::sync::Arc;

use tracing::{info, warn};

use crate::{console::ConsoleSupervisor, errors::Error, security::AuthLevel};

pub use command::{parse_command, BotCommand, ParsedCommand};

/// Reason reported when the one-shot reconnect itself fails.
pub const SERVER_UNAVAILABLE: &str = "server offline or error";

/// One inbound chat command plus the caller's resolved level.
#[derive(Clone, Debug)]
pub struct CommandRequest {
    pub text: String,
    pub auth: AuthLevel,
}

/// User-visible result of a dispatch. Console failures end up here, never as errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Not a command (no prefix); nothing should be sent back.
    Ignored,
    Pong,
    Unknown { name: String },
    Unauthorized { command: &'static str },
    /// Command needs an argument that was not given.
    Usage { command: &'static str },
    Success { payload: String, recovered: bool },
    Failed { payload: String, reason: String },
}

pub struct Dispatcher {
    prefix: char,
    console: Arc<ConsoleSupervisor>,
}

impl Dispatcher {
    pub fn new(prefix: char, console: Arc<ConsoleSupervisor>) -> Self {
        Self { prefix, console }
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub async fn dispatch(&self, req: &CommandRequest) -> Outcome {
        let Some(parsed) = parse_command(&req.text, self.prefix) else {
            return Outcome::Ignored;
        };
        let Some(command) = BotCommand::lookup(&parsed.name) else {
            return Outcome::Unknown { name: parsed.name };
        };
        if req.auth < command.required_level() {
            info!(command = command.name(), "unauthorized command");
            return Outcome::Unauthorized {
                command: command.name(),
            };
        }

        info!(
            command = command.name(),
            console = command.needs_console(),
            "dispatching command"
        );
        match command {
            BotCommand::Test => Outcome::Pong,
            BotCommand::Cmd if parsed.args.trim().is_empty() => Outcome::Usage {
                command: command.name(),
            },
            BotCommand::Cmd => self.run_on_console(parsed.args).await,
        }
    }

    /// Submit, and on any failure reconnect once and resubmit once.
    async fn run_on_console(&self, payload: &str) -> Outcome {
        let session = self.console.current().await;
        let first = match &session {
            Some(s) => s.run_command(payload).await,
            None => Err(Error::Connect("no console session".to_string())),
        };

        match first {
            Ok(()) => {
                return Outcome::Success {
                    payload: payload.to_string(),
                    recovered: false,
                }
            }
            Err(e) => warn!(error = %e, "console command failed; attempting reconnect"),
        }

        let session = match self.console.recover(session.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "console reconnect failed");
                return Outcome::Failed {
                    payload: payload.to_string(),
                    reason: SERVER_UNAVAILABLE.to_string(),
                };
            }
        };

        match session.run_command(payload).await {
            Ok(()) => Outcome::Success {
                payload: payload.to_string(),
                recovered: true,
            },
            Err(e) => {
                warn!(error = %e, "console command failed after reconnect");
                Outcome::Failed {
                    payload: payload.to_string(),
                    reason: e.to_string(),
                }
            }
        }
    }
}

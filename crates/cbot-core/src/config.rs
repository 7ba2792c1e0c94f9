use std::{env, fs, path::Path, time::Duration};

use crate::{
    domain::{ChatId, Credential, ServerId, UserId},
    errors::Error,
    Result,
};

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Chat platform
    pub telegram_bot_token: String,
    pub command_prefix: char,

    // Console access
    pub credential: Credential,
    pub server_id: ServerId,
    pub api_key: Option<String>,
    pub accounts_url: String,
    pub webapi_url: String,
    pub console_role: String,
    pub console_operators: Vec<UserId>,

    // Timeouts
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,

    // Relay destinations
    pub welcome_chat: Option<ChatId>,
    pub deletion_log_chat: Option<ChatId>,
    pub console_log_chat: Option<ChatId>,
    pub relay_ignored_channels: Vec<String>,
}

const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.townshiptale.com";
const DEFAULT_WEBAPI_URL: &str = "https://webapi.townshiptale.com";

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup (env in production, a map in tests).
    pub fn from_lookup(get: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let credential = load_credential(get)?;

        let server_id = match get("ATT_SERVER_ID").and_then(|s| s.trim().parse::<u64>().ok()) {
            Some(id) if id > 0 => ServerId(id),
            _ => {
                return Err(Error::Config(
                    "ATT_SERVER_ID must be a positive integer".to_string(),
                ))
            }
        };

        let command_prefix = match get("COMMAND_PREFIX").and_then(non_empty) {
            None => '!',
            Some(raw) => {
                let mut chars = raw.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => {
                        return Err(Error::Config(format!(
                            "COMMAND_PREFIX must be a single character, got {raw:?}"
                        )))
                    }
                }
            }
        };

        let api_key = get("ATT_API_KEY").and_then(non_empty);
        let accounts_url = get("ATT_ACCOUNTS_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_ACCOUNTS_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let webapi_url = get("ATT_WEBAPI_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_WEBAPI_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let console_role = get("CONSOLE_ROLE")
            .and_then(non_empty)
            .unwrap_or_else(|| "CorbotAccess".to_string());
        let console_operators = parse_csv_i64(get("CONSOLE_OPERATORS"))
            .into_iter()
            .map(UserId)
            .collect();

        let http_timeout = Duration::from_millis(parse_u64(get("HTTP_TIMEOUT_MS")).unwrap_or(10_000));
        let connect_timeout =
            Duration::from_millis(parse_u64(get("CONSOLE_CONNECT_TIMEOUT_MS")).unwrap_or(10_000));
        let command_timeout =
            Duration::from_millis(parse_u64(get("CONSOLE_COMMAND_TIMEOUT_MS")).unwrap_or(10_000));

        let welcome_chat = parse_i64(get("WELCOME_CHAT_ID")).map(ChatId);
        let deletion_log_chat = parse_i64(get("DELETION_LOG_CHAT_ID")).map(ChatId);
        let console_log_chat = parse_i64(get("CONSOLE_LOG_CHAT_ID")).map(ChatId);
        let relay_ignored_channels = parse_csv(
            get("RELAY_IGNORED_CHANNELS").or_else(|| Some("online-players".to_string())),
        );

        Ok(Self {
            telegram_bot_token,
            command_prefix,
            credential,
            server_id,
            api_key,
            accounts_url,
            webapi_url,
            console_role,
            console_operators,
            http_timeout,
            connect_timeout,
            command_timeout,
            welcome_chat,
            deletion_log_chat,
            console_log_chat,
            relay_ignored_channels,
        })
    }
}

/// Credential provider: both halves of the client credential are mandatory.
pub fn load_credential(get: &dyn Fn(&str) -> Option<String>) -> Result<Credential> {
    let client_id = get("ATT_CLIENT_ID").and_then(non_empty);
    let client_secret = get("ATT_CLIENT_SECRET").and_then(non_empty);
    match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => Ok(Credential {
            client_id: client_id.trim().to_string(),
            client_secret: client_secret.trim().to_string(),
        }),
        _ => Err(Error::Config(
            "ATT_CLIENT_ID and ATT_CLIENT_SECRET environment variables are required".to_string(),
        )),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_i64(v: Option<String>) -> Option<i64> {
    v.and_then(|s| s.trim().parse::<i64>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

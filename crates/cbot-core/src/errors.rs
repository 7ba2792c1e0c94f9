/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can tell "connection unavailable" apart from a failed command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The credential was rejected or the server is unknown / not accessible.
    #[error("auth error: {0}")]
    Auth(String),

    /// Transport failure while talking to the web API.
    #[error("network error: {0}")]
    Network(String),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("cancelled")]
    Cancelled,

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Errors that mean "no usable console right now" (token exchange or handshake).
    pub fn is_connection_unavailable(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::Network(_) | Error::Connect(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_connection_errors() {
        assert!(Error::Auth("rejected".into()).is_connection_unavailable());
        assert!(Error::Network("dns".into()).is_connection_unavailable());
        assert!(Error::Connect("handshake".into()).is_connection_unavailable());
        assert!(!Error::Command("boom".into()).is_connection_unavailable());
        assert!(!Error::Cancelled.is_connection_unavailable());
    }

    #[test]
    fn command_error_keeps_reason_text() {
        let e = Error::Command("Unknown command: tp".to_string());
        assert_eq!(e.to_string(), "command error: Unknown command: tp");
    }
}

use std::fmt;

/// Chat platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Chat platform chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Chat platform message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Game server id on the console web API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServerId(pub u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bot identity used for the client-credentials token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Short-lived token + endpoint pair authorizing one console connection attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub token: String,
    pub endpoint: String,
    pub server_id: ServerId,
}

impl fmt::Debug for AccessGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessGrant")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("server_id", &self.server_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_secrets() {
        let cred = Credential {
            client_id: "client-abc".to_string(),
            client_secret: "hunter2".to_string(),
        };
        let s = format!("{cred:?}");
        assert!(s.contains("client-abc"));
        assert!(!s.contains("hunter2"));

        let grant = AccessGrant {
            token: "eyJ.secret".to_string(),
            endpoint: "ws://10.0.0.1:1757".to_string(),
            server_id: ServerId(7),
        };
        let s = format!("{grant:?}");
        assert!(s.contains("ws://10.0.0.1:1757"));
        assert!(!s.contains("eyJ.secret"));
    }
}

//! Wire types for the web API and the websocket console.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cbot_core::{
    console::ConsoleEvent,
    domain::{AccessGrant, ServerId},
    errors::Error,
    Result,
};

/// `POST /connect/token` response (client credentials grant).
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
}

/// `POST /api/servers/{id}/console` response.
#[derive(Debug, Deserialize)]
pub(crate) struct ConsoleAccessResponse {
    #[serde(default)]
    pub allowed: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub connection: Option<ConnectionInfo>,
    /// Rejection reason; the web API sends it as `fail_reason`.
    #[serde(default, alias = "fail_reason")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectionInfo {
    pub address: String,
    pub websocket_port: u16,
}

impl ConsoleAccessResponse {
    pub(crate) fn into_grant(self, server_id: ServerId) -> Result<AccessGrant> {
        if !self.allowed {
            let why = self
                .message
                .unwrap_or_else(|| "console access not allowed".to_string());
            return Err(Error::Auth(format!("server {server_id}: {why}")));
        }
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Network(format!("server {server_id}: grant has no token")))?;
        let conn = self.connection.ok_or_else(|| {
            Error::Network(format!("server {server_id}: grant has no connection info (server offline?)"))
        })?;

        Ok(AccessGrant {
            token,
            endpoint: format!("ws://{}:{}", conn.address, conn.websocket_port),
            server_id,
        })
    }
}

/// Outbound console command.
#[derive(Debug, Serialize)]
pub(crate) struct CommandFrame<'a> {
    pub id: u64,
    pub content: &'a str,
}

/// Any inbound console frame.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "commandId", default)]
    pub command_id: Option<u64>,
    #[serde(rename = "eventType", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Value,
}

pub(crate) enum Inbound {
    /// Ack (or rejection) of a command we sent.
    CommandResult {
        id: u64,
        outcome: std::result::Result<(), String>,
    },
    Event(ConsoleEvent),
}

impl InboundFrame {
    pub(crate) fn classify(self) -> Inbound {
        match (self.kind.as_str(), self.command_id) {
            ("CommandResult", Some(id)) => Inbound::CommandResult {
                id,
                outcome: command_outcome(&self.data),
            },
            _ => Inbound::Event(ConsoleEvent::new(self.kind, self.event_type, self.data)),
        }
    }

    /// Handshake reply: `Some(Ok)` on success, `Some(Err(reason))` on rejection,
    /// `None` for frames unrelated to authentication.
    pub(crate) fn auth_result(&self) -> Option<std::result::Result<(), String>> {
        if self.kind != "SystemMessage" {
            return None;
        }
        let text = self.data.as_str().unwrap_or_default();
        if text.starts_with("Connection Succeeded") {
            Some(Ok(()))
        } else {
            Some(Err(if text.is_empty() {
                self.data.to_string()
            } else {
                text.to_string()
            }))
        }
    }
}

fn command_outcome(data: &Value) -> std::result::Result<(), String> {
    match data.get("Exception") {
        None | Some(Value::Null) => Ok(()),
        Some(exc) => Err(exc
            .get("Message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| exc.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn grant_endpoint_is_built_from_connection_info() {
        let resp: ConsoleAccessResponse = serde_json::from_value(json!({
            "server_id": 430116864,
            "allowed": true,
            "token": "eyJhbGciOi",
            "connection": {
                "server_id": 430116864,
                "address": "52.1.2.3",
                "local_address": "10.0.0.4",
                "websocket_port": 7071,
                "webserver_port": 7070
            }
        }))
        .unwrap();

        let grant = resp.into_grant(ServerId(430116864)).unwrap();
        assert_eq!(grant.endpoint, "ws://52.1.2.3:7071");
        assert_eq!(grant.token, "eyJhbGciOi");
    }

    #[test]
    fn disallowed_or_offline_servers_are_rejected() {
        let resp: ConsoleAccessResponse =
            serde_json::from_value(json!({ "allowed": false, "message": "Not a moderator" })).unwrap();
        let err = resp.into_grant(ServerId(1)).unwrap_err();
        assert!(matches!(err, Error::Auth(m) if m.contains("Not a moderator")));

        let resp: ConsoleAccessResponse = serde_json::from_value(json!({
            "server_id": 1, "allowed": false, "was_rejection": true, "fail_reason": "ServerOffline"
        }))
        .unwrap();
        let err = resp.into_grant(ServerId(1)).unwrap_err();
        assert!(matches!(err, Error::Auth(m) if m.contains("ServerOffline")));

        let resp: ConsoleAccessResponse =
            serde_json::from_value(json!({ "allowed": true, "token": "t" })).unwrap();
        assert!(resp.into_grant(ServerId(1)).is_err());
    }

    #[test]
    fn classifies_command_results_and_events() {
        let ok: InboundFrame = serde_json::from_value(json!({
            "type": "CommandResult", "commandId": 3, "data": { "Result": "OK" }
        }))
        .unwrap();
        assert!(matches!(ok.classify(), Inbound::CommandResult { id: 3, outcome: Ok(()) }));

        let bad: InboundFrame = serde_json::from_value(json!({
            "type": "CommandResult", "commandId": 4,
            "data": { "Exception": { "Message": "Unknown command: fly" } }
        }))
        .unwrap();
        match bad.classify() {
            Inbound::CommandResult { id, outcome } => {
                assert_eq!(id, 4);
                assert_eq!(outcome, Err("Unknown command: fly".to_string()));
            }
            Inbound::Event(_) => panic!("expected command result"),
        }

        let ev: InboundFrame = serde_json::from_value(json!({
            "type": "Subscription", "eventType": "PlayerJoined", "data": { "user": { "id": 1 } }
        }))
        .unwrap();
        match ev.classify() {
            Inbound::Event(e) => assert_eq!(e.label(), "Subscription/PlayerJoined"),
            Inbound::CommandResult { .. } => panic!("expected event"),
        }
    }

    #[test]
    fn auth_reply_detection() {
        let ok: InboundFrame = serde_json::from_value(json!({
            "type": "SystemMessage", "eventType": "None",
            "data": "Connection Succeeded, Authenticated as: 123 - CalliBot"
        }))
        .unwrap();
        assert_eq!(ok.auth_result(), Some(Ok(())));

        let bad: InboundFrame = serde_json::from_value(json!({
            "type": "SystemMessage", "data": "Connection Failed: invalid token"
        }))
        .unwrap();
        assert_eq!(bad.auth_result(), Some(Err("Connection Failed: invalid token".to_string())));

        let other: InboundFrame =
            serde_json::from_value(json!({ "type": "Subscription", "data": {} })).unwrap();
        assert_eq!(other.auth_result(), None);
    }

    #[test]
    fn command_frame_shape() {
        let s = serde_json::to_string(&CommandFrame { id: 7, content: "player list" }).unwrap();
        assert_eq!(s, r#"{"id":7,"content":"player list"}"#);
    }
}

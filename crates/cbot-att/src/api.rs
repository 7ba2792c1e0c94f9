//! Web API access exchange (accounts token + console grant).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use cbot_core::{
    config::Config,
    console::AccessExchanger,
    domain::{AccessGrant, Credential, ServerId},
    errors::Error,
    Result,
};

use crate::protocol::{ConsoleAccessResponse, TokenResponse};

const CONSOLE_SCOPE: &str = "server.view server.console";

/// Exchanges the bot credential for a console grant on every call.
#[derive(Clone, Debug)]
pub struct AttAccessExchanger {
    http: reqwest::Client,
    credential: Credential,
    api_key: Option<String>,
    accounts_url: String,
    webapi_url: String,
}

impl AttAccessExchanger {
    pub fn new(
        credential: Credential,
        accounts_url: impl Into<String>,
        webapi_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            credential,
            api_key,
            accounts_url: accounts_url.into(),
            webapi_url: webapi_url.into(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(
            cfg.credential.clone(),
            cfg.accounts_url.clone(),
            cfg.webapi_url.clone(),
            cfg.api_key.clone(),
            cfg.http_timeout,
        )
    }

    async fn account_token(&self) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/connect/token", self.accounts_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credential.client_id.as_str()),
                ("client_secret", self.credential.client_secret.as_str()),
                ("scope", CONSOLE_SCOPE),
            ])
            .send()
            .await
            .map_err(network)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error("token request", status, &body));
        }

        let token: TokenResponse = resp.json().await.map_err(network)?;
        debug!(client_id = %self.credential.client_id, "account token issued");
        Ok(token.access_token)
    }
}

#[async_trait]
impl AccessExchanger for AttAccessExchanger {
    async fn exchange(&self, server_id: ServerId) -> Result<AccessGrant> {
        let bearer = self.account_token().await?;

        let mut req = self
            .http
            .post(format!("{}/api/servers/{}/console", self.webapi_url, server_id.0))
            .bearer_auth(bearer)
            .header("Content-Type", "application/json")
            .body("{}");
        if let Some(key) = &self.api_key {
            req = req.header("x-api-key", key);
        }

        let resp = req.send().await.map_err(network)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error("console access request", status, &body));
        }

        let access: ConsoleAccessResponse = resp.json().await.map_err(network)?;
        let grant = access.into_grant(server_id)?;
        info!(%server_id, endpoint = %grant.endpoint, "console access granted");
        Ok(grant)
    }
}

fn network(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}

/// Rejected credentials / unknown servers are auth failures; everything else
/// is treated as a transport problem.
fn status_error(what: &str, status: StatusCode, body: &str) -> Error {
    let body: String = body.chars().take(200).collect();
    let msg = format!("{what} failed: {status} {body}");
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND => Error::Auth(msg),
        _ => Error::Network(msg),
    }
}

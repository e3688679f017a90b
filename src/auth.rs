//! OAuth2 client-credentials token acquisition for Microsoft Graph.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::GraphConfig;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

pub struct TokenProvider {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: Client,
}

impl TokenProvider {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            token_url: token_url(&config.login_url, &config.tenant_id),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            http,
        })
    }

    /// Request a fresh app-only bearer token.
    pub async fn access_token(&self) -> Result<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];

        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .with_context(|| format!("POST {}", self.token_url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("token endpoint returned {}: {}", status, body);
        }

        let token: TokenResponse = resp
            .json()
            .await
            .context("parsing token response")?;
        debug!(expires_in = ?token.expires_in, "acquired Graph access token");
        Ok(token.access_token)
    }
}

fn token_url(login_url: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        login_url.trim_end_matches('/'),
        tenant_id
    )
}

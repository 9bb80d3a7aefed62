//! Scanning API client.
//!
//! Every call is a single `GET` with the game number and a player's API key
//! in the query string. The response is always a JSON envelope; a request
//! can fail with status 200 and a non-empty `error` field.

use async_trait::async_trait;
use npscan_core::config::ApiConfig;
use npscan_core::snapshot::{ApiResponse, Snapshot};
use thiserror::Error;
use tracing::debug;

/// Scanning API client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scanning API returned status {0}")]
    Status(u16),

    #[error("scanning API error: {0}")]
    Api(String),

    #[error("failed to decode scanning API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid scanning API URL: {0}")]
    Url(String),
}

/// Fetches a player's current view of a game.
#[async_trait]
pub trait GameClient: Send + Sync {
    async fn fetch(&self, game_number: &str, api_key: &str) -> Result<Snapshot, ClientError>;
}

/// [`GameClient`] backed by the real HTTP API.
#[derive(Debug, Clone)]
pub struct HttpGameClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGameClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        // reqwest is built with rustls-no-provider; Err means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    fn request_url(&self, game_number: &str, api_key: &str) -> Result<reqwest::Url, ClientError> {
        reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("api_version", "0.1"),
                ("game_number", game_number),
                ("code", api_key),
            ],
        )
        .map_err(|e| ClientError::Url(e.to_string()))
    }
}

#[async_trait]
impl GameClient for HttpGameClient {
    async fn fetch(&self, game_number: &str, api_key: &str) -> Result<Snapshot, ClientError> {
        let url = self.request_url(game_number, api_key)?;
        let resp = self.http.get(url).send().await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = resp.bytes().await?;
        let envelope: ApiResponse = serde_json::from_slice(&body)?;
        if !envelope.error.is_empty() {
            return Err(ClientError::Api(envelope.error));
        }

        debug!(
            game_number,
            player = envelope.scanning_data.player_uid,
            now = envelope.scanning_data.now,
            "Fetched snapshot"
        );
        Ok(envelope.scanning_data)
    }
}

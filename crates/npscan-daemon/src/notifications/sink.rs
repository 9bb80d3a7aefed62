//! Notification transports.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{NotificationError, RenderStyle};

/// Delivers rendered messages somewhere.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    fn render_style(&self) -> RenderStyle {
        RenderStyle::Plain
    }

    async fn send(&self, message: &str) -> Result<(), NotificationError>;
}

/// Discards every message. Detection and bookkeeping still run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilSink;

#[async_trait]
impl Sink for NilSink {
    fn name(&self) -> &'static str {
        "nil"
    }

    async fn send(&self, _message: &str) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DiscordWebhook<'a> {
    content: &'a str,
}

/// Posts messages to a Discord webhook.
#[derive(Debug, Clone)]
pub struct DiscordWebhookSink {
    http: reqwest::Client,
    url: String,
}

impl DiscordWebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self, NotificationError> {
        // reqwest is built with rustls-no-provider; Err means already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(url, http))
    }

    pub fn with_client(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Sink for DiscordWebhookSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn render_style(&self) -> RenderStyle {
        RenderStyle::ChatMentions
    }

    async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&DiscordWebhook { content: message })
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(NotificationError::Status {
                sink: self.name(),
                status: status.as_u16(),
            });
        }
        debug!(status = status.as_u16(), "Discord webhook delivered");
        Ok(())
    }
}

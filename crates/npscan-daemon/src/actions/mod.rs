//! Caller-facing operations shared by the CLI and the HTTP API.
//!
//! [`Scanner`] owns the poller together with the notification pipeline. Every
//! operation that mutates a match takes that match's lock first.

mod credentials;
mod merged;
mod threats;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use npscan_core::{Config, Snapshot};
use tracing::{info, warn};

pub use merged::{MAX_SNAPSHOT_LIMIT, parse_snapshot_limit};
pub use threats::ThreatNotice;

use crate::error::Result;
use crate::locks::MatchLocks;
use crate::matches::Match;
use crate::notifications::{
    DiscordWebhookSink, NilSink, NotificationDatabase, NotificationGuard, Sink,
};
use crate::npapi::HttpGameClient;
use crate::poller::{PollOptions, PollOutcome, PollReport, Poller};
use crate::storage::MatchDatabase;

#[derive(Clone)]
pub struct Scanner {
    poller: Poller,
    guard: Arc<dyn NotificationGuard>,
    sinks: Vec<Arc<dyn Sink>>,
    pacing: Duration,
}

impl Scanner {
    pub fn new(
        poller: Poller,
        guard: Arc<dyn NotificationGuard>,
        sinks: Vec<Arc<dyn Sink>>,
        pacing: Duration,
    ) -> Self {
        Self {
            poller,
            guard,
            sinks,
            pacing,
        }
    }

    /// Open both databases and build the HTTP clients described by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let db_path = config.storage.database_path();
        info!(path = %db_path.display(), "Opening match database");
        let db = MatchDatabase::open(&db_path).await?;

        let guard_path = config.storage.notifications_database_path();
        info!(path = %guard_path.display(), "Opening notification database");
        let guard = NotificationDatabase::open(&guard_path).await?;

        let client = HttpGameClient::new(&config.api)?;
        let poller = Poller::new(
            db,
            Arc::new(client),
            MatchLocks::new(),
            config.storage.snapshot_encoding,
        );

        let sink: Arc<dyn Sink> = match &config.notifications.discord_webhook_url {
            Some(url) => Arc::new(DiscordWebhookSink::new(url.as_str())?),
            None => {
                info!("No Discord webhook configured, threats are only logged");
                Arc::new(NilSink)
            }
        };

        Ok(Self::new(
            poller,
            Arc::new(guard),
            vec![sink],
            Duration::from_millis(config.notifications.pacing_millis),
        ))
    }

    pub const fn poller(&self) -> &Poller {
        &self.poller
    }

    pub const fn db(&self) -> &MatchDatabase {
        self.poller.db()
    }

    /// Poll the given matches, or every stored match when `ids` is empty.
    pub async fn poll(&self, ids: &[String], options: &PollOptions) -> PollReport {
        if ids.is_empty() {
            self.poller.poll_all(options).await
        } else {
            self.poller.poll_matches(ids, options).await
        }
    }

    /// Poll, then look for threats in every match that changed.
    pub async fn poll_and_notify(
        &self,
        ids: &[String],
        options: &PollOptions,
    ) -> Result<BTreeMap<String, PollOutcome>> {
        let mut report = self.poll(ids, options).await;

        let changed: Vec<String> = report.changed_matches().map(str::to_string).collect();
        for id in changed {
            match self.notify_threats(&id).await {
                Ok(dispatch) => info!(
                    match_id = %id,
                    sent = dispatch.sent,
                    skipped = dispatch.skipped,
                    "Threats dispatched"
                ),
                Err(e) => {
                    warn!(match_id = %id, error = %e, "Threat notification failed");
                    report.errors.push(e);
                }
            }
        }

        report.into_result()
    }

    /// Fetch a snapshot without storing anything.
    pub async fn fetch(&self, match_id: &str, api_key: &str) -> Result<Snapshot> {
        Ok(self.poller.client().fetch(match_id, api_key).await?)
    }

    /// Re-encode stored JSON snapshots as LZ4. Returns how many were converted.
    pub async fn compress_snapshots(&self) -> Result<u64> {
        Ok(self.db().compress_snapshots().await?)
    }

    /// Every match, unfinished ones first, then by name.
    pub async fn match_index(&self) -> Result<Vec<Match>> {
        let mut matches = self.db().list_matches().await?;
        matches.sort_by(|a, b| a.finished.cmp(&b.finished).then_with(|| a.name.cmp(&b.name)));
        Ok(matches)
    }
}

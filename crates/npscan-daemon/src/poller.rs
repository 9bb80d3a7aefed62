//! Snapshot poller.
//!
//! For one match, fetch every eligible credential's current snapshot, store
//! it, and update the credential's bookkeeping. A failing credential never
//! stops its siblings, and a failing match never stops the others.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use npscan_core::config::SnapshotEncoding;
use npscan_core::db::unix_timestamp;
use npscan_core::multierror::collapse;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::locks::MatchLocks;
use crate::npapi::GameClient;
use crate::storage::MatchDatabase;

/// Default minimum time between two polls of the same credential.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Poll credentials even if they were polled recently.
    pub force: bool,
    pub min_interval: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            force: false,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Some credential produced a snapshot newer than its previous watermark.
    pub changed: bool,
}

/// Result of polling several matches.
#[derive(Debug, Default)]
pub struct PollReport {
    /// One entry per match that could be loaded.
    pub outcomes: BTreeMap<String, PollOutcome>,
    pub errors: Vec<Error>,
}

impl PollReport {
    pub fn changed_matches(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.changed)
            .map(|(id, _)| id.as_str())
    }

    /// Collapse the collected errors; outcomes are discarded on failure.
    pub fn into_result(self) -> Result<BTreeMap<String, PollOutcome>> {
        collapse(self.errors)?;
        Ok(self.outcomes)
    }
}

#[derive(Clone)]
pub struct Poller {
    db: MatchDatabase,
    client: Arc<dyn GameClient>,
    locks: MatchLocks,
    encoding: SnapshotEncoding,
}

impl Poller {
    pub fn new(
        db: MatchDatabase,
        client: Arc<dyn GameClient>,
        locks: MatchLocks,
        encoding: SnapshotEncoding,
    ) -> Self {
        Self {
            db,
            client,
            locks,
            encoding,
        }
    }

    pub const fn db(&self) -> &MatchDatabase {
        &self.db
    }

    pub fn client(&self) -> &dyn GameClient {
        self.client.as_ref()
    }

    pub const fn locks(&self) -> &MatchLocks {
        &self.locks
    }

    pub const fn encoding(&self) -> SnapshotEncoding {
        self.encoding
    }

    /// Poll every stored match.
    pub async fn poll_all(&self, options: &PollOptions) -> PollReport {
        match self.db.list_match_ids().await {
            Ok(ids) => self.poll_matches(&ids, options).await,
            Err(e) => PollReport {
                outcomes: BTreeMap::new(),
                errors: vec![e.into()],
            },
        }
    }

    pub async fn poll_matches<S: AsRef<str>>(&self, ids: &[S], options: &PollOptions) -> PollReport {
        let mut report = PollReport::default();
        for id in ids {
            self.poll_into(id.as_ref(), options, &mut report).await;
        }
        report
    }

    pub async fn poll_match(&self, id: &str, options: &PollOptions) -> PollReport {
        let mut report = PollReport::default();
        self.poll_into(id, options, &mut report).await;
        report
    }

    /// Poll one match and add its outcome and errors to `report`.
    pub async fn poll_into(&self, id: &str, options: &PollOptions, report: &mut PollReport) {
        let _guard = self.locks.lock(id).await;

        let mut m = match self.db.find_match(id).await {
            Ok(m) => m,
            Err(e) => {
                report
                    .errors
                    .push(Error::poll(id, None, "failed to find match", e));
                return;
            }
        };

        if m.finished {
            debug!(match_id = %id, "Match finished, not polling");
            report.outcomes.insert(m.id, PollOutcome::default());
            return;
        }
        if m.credentials.is_empty() {
            info!(match_id = %id, "Match has no credentials");
            report.outcomes.insert(m.id, PollOutcome::default());
            return;
        }

        let now = unix_timestamp();
        let min_interval = i64::try_from(options.min_interval.as_secs()).unwrap_or(i64::MAX);
        let mut changed = false;
        let mut game_over = false;
        let mut game_name = None;

        for cred in m.credentials.values_mut() {
            if cred.is_disabled() {
                debug!(match_id = %id, player = cred.player_uid, "Credential disabled, skipping");
                continue;
            }
            if !options.force && cred.last_poll.is_some_and(|last| now - last < min_interval) {
                debug!(match_id = %id, player = cred.player_uid, "Polled recently, skipping");
                continue;
            }

            let snapshot = match self.client.fetch(id, &cred.api_key).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(match_id = %id, player = cred.player_uid, error = %e, "Fetch failed");
                    report.errors.push(Error::poll(
                        id,
                        Some(cred.player_uid),
                        "failed to fetch snapshot",
                        e,
                    ));
                    continue;
                }
            };

            if let Err(e) = self.db.save_snapshot(id, &snapshot, self.encoding).await {
                report.errors.push(Error::poll(
                    id,
                    Some(cred.player_uid),
                    "failed to save snapshot",
                    e,
                ));
                continue;
            }

            if let Some(reason) = snapshot.viewer_elimination() {
                info!(
                    match_id = %id,
                    player = cred.player_uid,
                    ?reason,
                    "Player eliminated, disabling credential"
                );
                cred.disable();
            }

            if cred.advance_watermark(snapshot.now) {
                changed = true;
            }
            cred.last_poll = Some(now);
            let alias = snapshot.viewer_alias();
            if !alias.is_empty() && alias != cred.alias {
                cred.alias = alias.to_string();
            }

            game_over |= snapshot.game_over;
            if game_name.is_none() && !snapshot.name.is_empty() {
                game_name = Some(snapshot.name);
            }

            info!(match_id = %id, player = cred.player_uid, now = snapshot.now, "Polled");
        }

        if game_over {
            info!(match_id = %id, "Game over, marking match finished");
            m.finished = true;
        }
        if m.name.is_empty() {
            if let Some(name) = game_name {
                m.name = name;
            }
        }
        m.last_poll = Some(now);

        if let Err(e) = self.db.save_match(&m).await {
            report
                .errors
                .push(Error::poll(id, None, "failed to save match", e));
        }

        report.outcomes.insert(m.id, PollOutcome { changed });
    }
}

//! Fused views over stored snapshots.

use std::collections::BTreeMap;

use npscan_core::fusion::{FusionError, merge};
use npscan_core::snapshot::PlayerId;
use npscan_core::Snapshot;
use tracing::debug;

use super::Scanner;
use crate::access::Visibility;
use crate::error::{Error, Result};
use crate::matches::Match;

/// Snapshot history listings return at most this many entries.
pub const MAX_SNAPSHOT_LIMIT: u32 = 1000;
const DEFAULT_SNAPSHOT_LIMIT: u32 = 50;

/// Parse an optional history limit. Missing means the default.
pub fn parse_snapshot_limit(raw: Option<&str>) -> Result<u32> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SNAPSHOT_LIMIT);
    };
    match raw.parse::<u32>() {
        Ok(limit) if (1..=MAX_SNAPSHOT_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(Error::Validation(format!(
            "limit must be between 1 and {MAX_SNAPSHOT_LIMIT}, got {raw:?}"
        ))),
    }
}

/// Which snapshot to load for one player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pick {
    Latest,
    At(i64),
}

impl Pick {
    fn parse(player: PlayerId, raw: &str) -> Result<Self> {
        match raw {
            "" | "latest" => Ok(Self::Latest),
            other => other.parse().map(Self::At).map_err(|_| {
                Error::Validation(format!(
                    "snapshot time for player {player} must be a number or \"latest\", got {other:?}"
                ))
            }),
        }
    }
}

impl Scanner {
    /// Fuse the snapshots a caller presenting `presented` may see.
    ///
    /// `overrides` maps player ids to a capture time, or to `""` or
    /// `"latest"` for the watermark. Disabled players are left out unless
    /// an override names an explicit capture time.
    pub async fn merged_view(
        &self,
        match_id: &str,
        presented: &str,
        overrides: &BTreeMap<PlayerId, String>,
    ) -> Result<Snapshot> {
        let m = self.db().find_match(match_id).await?;
        let visibility = m.resolve_visibility(presented)?;
        self.merged_for(&m, &visibility, overrides).await
    }

    /// Fuse the chosen snapshot of every credential `visibility` covers.
    pub async fn merged_for(
        &self,
        m: &Match,
        visibility: &Visibility,
        overrides: &BTreeMap<PlayerId, String>,
    ) -> Result<Snapshot> {
        let mut loaded = Vec::new();

        for cred in m.credentials.values() {
            let player = cred.player_uid;
            if !visibility.can_view(player) {
                continue;
            }

            let pick = match overrides.get(&player) {
                Some(raw) => Pick::parse(player, raw)?,
                None => Pick::Latest,
            };
            let captured_at = match pick {
                Pick::Latest if cred.is_disabled() => continue,
                Pick::Latest => cred.latest_snapshot().unwrap_or(0),
                Pick::At(t) => t,
            };
            if captured_at == 0 {
                debug!(match_id = %m.id, player, "No snapshot to load");
                continue;
            }

            loaded.push(self.db().find_snapshot(&m.id, player, captured_at).await?);
        }

        merge(loaded).map_err(|FusionError::Empty| Error::NothingToMerge)
    }

    /// Capture times of one player's snapshots, newest first.
    pub async fn player_snapshot_times(
        &self,
        match_id: &str,
        presented: &str,
        player: PlayerId,
        limit: u32,
    ) -> Result<Vec<i64>> {
        let m = self.db().find_match(match_id).await?;
        let visibility = m.resolve_visibility(presented)?;
        if !visibility.can_view(player) {
            return Err(Error::Forbidden(format!(
                "player {player} is not visible with this access code"
            )));
        }
        Ok(self
            .db()
            .list_snapshot_times(match_id, player, limit.min(MAX_SNAPSHOT_LIMIT))
            .await?)
    }
}

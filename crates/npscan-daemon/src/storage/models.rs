//! Row types for match storage and their conversion into domain types.

use std::collections::BTreeSet;

use npscan_core::db::DatabaseError;
use npscan_core::snapshot::PlayerId;

use crate::access::{AccessProfile, Visibility};
use crate::matches::{Credential, PollingState};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchRow {
    pub id: String,
    pub name: String,
    pub finished: bool,
    pub last_poll: Option<i64>,
    pub legacy_access_hash: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub match_id: String,
    pub player_uid: i64,
    pub alias: String,
    pub api_key: String,
    pub last_poll: Option<i64>,
    pub latest_snapshot: i64,
    pub polling_state: String,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = DatabaseError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let state = PollingState::parse(&row.polling_state).ok_or_else(|| {
            DatabaseError::Corrupt(format!(
                "credential {}/{} has polling state {:?}",
                row.match_id, row.player_uid, row.polling_state
            ))
        })?;
        Ok(Self::restore(
            row.player_uid,
            row.alias,
            row.api_key,
            row.last_poll,
            row.latest_snapshot,
            state,
        ))
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessProfileRow {
    pub match_id: String,
    pub position: i64,
    pub secret_hash: String,
    /// JSON array of player ids, `NULL` for full visibility.
    pub allowed_players: Option<String>,
}

impl TryFrom<AccessProfileRow> for AccessProfile {
    type Error = DatabaseError;

    fn try_from(row: AccessProfileRow) -> Result<Self, Self::Error> {
        let visibility = match row.allowed_players {
            None => Visibility::Everyone,
            Some(json) => {
                let players: BTreeSet<PlayerId> = serde_json::from_str(&json).map_err(|e| {
                    DatabaseError::Corrupt(format!(
                        "access profile {}#{}: {e}",
                        row.match_id, row.position
                    ))
                })?;
                Visibility::Players(players)
            }
        };
        Ok(Self {
            secret_hash: row.secret_hash,
            visibility,
        })
    }
}

/// Serialized form of a profile's visibility for the `allowed_players` column.
pub fn allowed_players_column(visibility: &Visibility) -> Result<Option<String>, DatabaseError> {
    match visibility {
        Visibility::Everyone => Ok(None),
        Visibility::Players(players) => serde_json::to_string(players)
            .map(Some)
            .map_err(|e| DatabaseError::Query(e.to_string())),
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscordUserRow {
    pub player_uid: i64,
    pub discord_user_id: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    pub match_id: String,
    pub player_uid: i64,
    pub captured_at: i64,
    pub encoding: String,
    pub payload: Vec<u8>,
}

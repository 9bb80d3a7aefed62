//! Match record queries.
//!
//! A match is persisted across four tables. `save_match` rewrites all of
//! them in one transaction, so callers must hold the match lock while doing
//! a read-modify-write.

use npscan_core::db::{DatabaseError, unix_timestamp};

use super::db::MatchDatabase;
use super::models::{
    AccessProfileRow, CredentialRow, DiscordUserRow, MatchRow, allowed_players_column,
};
use crate::access::AccessProfile;
use crate::matches::{Credential, Match};

impl MatchDatabase {
    /// Persist the whole match record, replacing what was stored before.
    pub async fn save_match(&self, m: &Match) -> Result<(), DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            "INSERT INTO matches (id, name, finished, last_poll, legacy_access_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, finished = excluded.finished, \
             last_poll = excluded.last_poll, legacy_access_hash = excluded.legacy_access_hash, \
             updated_at = excluded.updated_at",
        )
        .bind(&m.id)
        .bind(&m.name)
        .bind(m.finished)
        .bind(m.last_poll)
        .bind(m.legacy_access_hash.as_deref())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for table in ["credentials", "access_profiles", "discord_users"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE match_id = ?"))
                .bind(&m.id)
                .execute(&mut *tx)
                .await?;
        }

        for cred in m.credentials.values() {
            sqlx::query(
                "INSERT INTO credentials (match_id, player_uid, alias, api_key, last_poll, latest_snapshot, polling_state) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&m.id)
            .bind(cred.player_uid)
            .bind(&cred.alias)
            .bind(&cred.api_key)
            .bind(cred.last_poll)
            .bind(cred.latest_snapshot().unwrap_or(0))
            .bind(cred.state().as_str())
            .execute(&mut *tx)
            .await?;
        }

        for (position, profile) in (0_i64..).zip(&m.access_profiles) {
            sqlx::query(
                "INSERT INTO access_profiles (match_id, position, secret_hash, allowed_players) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&m.id)
            .bind(position)
            .bind(&profile.secret_hash)
            .bind(allowed_players_column(&profile.visibility)?)
            .execute(&mut *tx)
            .await?;
        }

        for (player, discord_id) in &m.discord_user_ids {
            sqlx::query(
                "INSERT INTO discord_users (match_id, player_uid, discord_user_id) VALUES (?, ?, ?)",
            )
            .bind(&m.id)
            .bind(*player)
            .bind(discord_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load a match, failing with `NotFound` if it has never been saved.
    pub async fn find_match(&self, id: &str) -> Result<Match, DatabaseError> {
        let row = sqlx::query_as::<_, MatchRow>(
            "SELECT id, name, finished, last_poll, legacy_access_hash FROM matches WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Match {id}")))?;

        self.hydrate(row).await
    }

    /// Load a match, or start a fresh unsaved record if it does not exist.
    pub async fn find_or_create_match(&self, id: &str) -> Result<Match, DatabaseError> {
        match self.find_match(id).await {
            Ok(m) => Ok(m),
            Err(DatabaseError::NotFound(_)) => Ok(Match::new(id)),
            Err(e) => Err(e),
        }
    }

    pub async fn list_match_ids(&self) -> Result<Vec<String>, DatabaseError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT id FROM matches ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        Ok(ids)
    }

    pub async fn list_matches(&self) -> Result<Vec<Match>, DatabaseError> {
        let rows = sqlx::query_as::<_, MatchRow>(
            "SELECT id, name, finished, last_poll, legacy_access_hash FROM matches ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            matches.push(self.hydrate(row).await?);
        }
        Ok(matches)
    }

    async fn hydrate(&self, row: MatchRow) -> Result<Match, DatabaseError> {
        let mut m = Match::new(row.id);
        m.name = row.name;
        m.finished = row.finished;
        m.last_poll = row.last_poll;
        m.legacy_access_hash = row.legacy_access_hash;

        let creds = sqlx::query_as::<_, CredentialRow>(
            "SELECT * FROM credentials WHERE match_id = ? ORDER BY player_uid",
        )
        .bind(&m.id)
        .fetch_all(self.pool())
        .await?;
        for row in creds {
            let cred = Credential::try_from(row)?;
            m.credentials.insert(cred.player_uid, cred);
        }

        let profiles = sqlx::query_as::<_, AccessProfileRow>(
            "SELECT * FROM access_profiles WHERE match_id = ? ORDER BY position",
        )
        .bind(&m.id)
        .fetch_all(self.pool())
        .await?;
        m.access_profiles = profiles
            .into_iter()
            .map(AccessProfile::try_from)
            .collect::<Result<_, _>>()?;

        let discord = sqlx::query_as::<_, DiscordUserRow>(
            "SELECT player_uid, discord_user_id FROM discord_users WHERE match_id = ?",
        )
        .bind(&m.id)
        .fetch_all(self.pool())
        .await?;
        m.discord_user_ids = discord
            .into_iter()
            .map(|row| (row.player_uid, row.discord_user_id))
            .collect();

        Ok(m)
    }
}

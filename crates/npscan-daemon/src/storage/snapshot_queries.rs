//! Snapshot archive queries.
//!
//! Snapshots are keyed by `(match, player, capture time)` and never change
//! once written. Payloads are stored either as plain JSON or as
//! size-prefixed LZ4-compressed JSON.

use npscan_core::config::SnapshotEncoding;
use npscan_core::db::{DatabaseError, unix_timestamp};
use npscan_core::snapshot::{PlayerId, Snapshot};
use tracing::info;

use super::db::MatchDatabase;
use super::models::SnapshotRow;

fn encode(snapshot: &Snapshot, encoding: SnapshotEncoding) -> Result<Vec<u8>, DatabaseError> {
    let json = snapshot
        .to_json()
        .map_err(|e| DatabaseError::Query(format!("failed to encode snapshot: {e}")))?;
    Ok(match encoding {
        SnapshotEncoding::Json => json,
        SnapshotEncoding::Lz4 => lz4_flex::compress_prepend_size(&json),
    })
}

fn decode(row: &SnapshotRow) -> Result<Snapshot, DatabaseError> {
    let corrupt = |what: String| {
        DatabaseError::Corrupt(format!(
            "snapshot {}/{}/{}: {what}",
            row.match_id, row.player_uid, row.captured_at
        ))
    };

    let encoding = SnapshotEncoding::parse(&row.encoding)
        .ok_or_else(|| corrupt(format!("unknown encoding {:?}", row.encoding)))?;
    let json = match encoding {
        SnapshotEncoding::Json => std::borrow::Cow::Borrowed(row.payload.as_slice()),
        SnapshotEncoding::Lz4 => std::borrow::Cow::Owned(
            lz4_flex::decompress_size_prepended(&row.payload)
                .map_err(|e| corrupt(e.to_string()))?,
        ),
    };
    Snapshot::from_json(&json).map_err(|e| corrupt(e.to_string()))
}

impl MatchDatabase {
    /// Store a snapshot under its own viewer and capture time.
    ///
    /// Returns `false` if a snapshot with the same key already existed; the
    /// stored copy is left untouched.
    pub async fn save_snapshot(
        &self,
        match_id: &str,
        snapshot: &Snapshot,
        encoding: SnapshotEncoding,
    ) -> Result<bool, DatabaseError> {
        let payload = encode(snapshot, encoding)?;
        let result = sqlx::query(
            "INSERT OR IGNORE INTO snapshots (match_id, player_uid, captured_at, encoding, payload, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(match_id)
        .bind(snapshot.player_uid)
        .bind(snapshot.now)
        .bind(encoding.as_str())
        .bind(payload)
        .bind(unix_timestamp())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_snapshot(
        &self,
        match_id: &str,
        player: PlayerId,
        captured_at: i64,
    ) -> Result<Snapshot, DatabaseError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT match_id, player_uid, captured_at, encoding, payload FROM snapshots \
             WHERE match_id = ? AND player_uid = ? AND captured_at = ?",
        )
        .bind(match_id)
        .bind(player)
        .bind(captured_at)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| {
            DatabaseError::NotFound(format!(
                "Snapshot for match {match_id} player {player} at {captured_at}"
            ))
        })?;

        decode(&row)
    }

    /// Capture times of a player's snapshots, newest first.
    pub async fn list_snapshot_times(
        &self,
        match_id: &str,
        player: PlayerId,
        limit: u32,
    ) -> Result<Vec<i64>, DatabaseError> {
        let times = sqlx::query_scalar::<_, i64>(
            "SELECT captured_at FROM snapshots WHERE match_id = ? AND player_uid = ? \
             ORDER BY captured_at DESC LIMIT ?",
        )
        .bind(match_id)
        .bind(player)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;
        Ok(times)
    }

    /// Re-encode every plain JSON snapshot as LZ4.
    ///
    /// Returns how many snapshots were converted. Fails with
    /// [`DatabaseError::NothingToCompact`] when there is nothing left to
    /// convert, which makes repeated runs harmless. Runs in one
    /// transaction: any undecodable JSON row fails the whole call with
    /// [`DatabaseError::Corrupt`] and nothing is converted.
    pub async fn compress_snapshots(&self) -> Result<u64, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT match_id, player_uid, captured_at, encoding, payload FROM snapshots \
             WHERE encoding = 'json'",
        )
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            return Err(DatabaseError::NothingToCompact);
        }

        let mut converted = 0_u64;
        for row in rows {
            // A corrupt payload aborts the run and rolls back every row.
            decode(&row)?;
            let compressed = lz4_flex::compress_prepend_size(&row.payload);
            sqlx::query(
                "UPDATE snapshots SET encoding = 'lz4', payload = ? \
                 WHERE match_id = ? AND player_uid = ? AND captured_at = ?",
            )
            .bind(compressed)
            .bind(&row.match_id)
            .bind(row.player_uid)
            .bind(row.captured_at)
            .execute(&mut *tx)
            .await?;
            converted += 1;
        }

        tx.commit().await?;
        info!(converted, "Snapshots compressed");
        Ok(converted)
    }
}

//! Credential, access code and player bookkeeping operations.

use npscan_core::snapshot::PlayerId;
use tracing::info;

use super::Scanner;
use crate::access::{AccessProfile, Visibility};
use crate::error::{Error, Result};
use crate::matches::{Credential, Match};

impl Scanner {
    /// Validate `api_key` against the game and store it for whichever player
    /// it belongs to. The validating snapshot is kept.
    ///
    /// Replacing a key keeps the credential's polling state and watermark.
    pub async fn set_credentials(&self, match_id: &str, api_key: &str) -> Result<PlayerId> {
        if match_id.is_empty() {
            return Err(Error::Validation("match id must not be empty".into()));
        }
        if api_key.is_empty() {
            return Err(Error::Validation("API key must not be empty".into()));
        }

        let snapshot = self.fetch(match_id, api_key).await?;
        let player = snapshot.player_uid;

        let _guard = self.poller.locks().lock(match_id).await;
        let mut m = self.db().find_or_create_match(match_id).await?;

        self.db()
            .save_snapshot(match_id, &snapshot, self.poller.encoding())
            .await?;

        let cred = m
            .credentials
            .entry(player)
            .or_insert_with(|| Credential::new(player, "", api_key));
        cred.api_key = api_key.to_string();
        let alias = snapshot.viewer_alias();
        if !alias.is_empty() {
            cred.alias = alias.to_string();
        }
        cred.advance_watermark(snapshot.now);

        if m.name.is_empty() {
            m.name.clone_from(&snapshot.name);
        }

        self.db().save_match(&m).await?;
        info!(match_id, player, "Credentials stored");
        Ok(player)
    }

    /// Add an access code, optionally wiping the existing ones first.
    ///
    /// An empty `allowed` list grants full visibility. With `wipe` set, an
    /// empty `code` just reopens the match.
    pub async fn protect(
        &self,
        match_id: &str,
        code: &str,
        allowed: &[PlayerId],
        wipe: bool,
    ) -> Result<()> {
        if code.is_empty() && !wipe {
            return Err(Error::Validation("access code must not be empty".into()));
        }

        let _guard = self.poller.locks().lock(match_id).await;
        let mut m = self.db().find_match(match_id).await?;

        if wipe {
            m.wipe_access_codes();
            info!(match_id, "Access codes wiped");
        }
        if !code.is_empty() {
            let visibility = if allowed.is_empty() {
                Visibility::Everyone
            } else {
                Visibility::Players(allowed.iter().copied().collect())
            };
            let profile = AccessProfile::new(code, visibility)?;
            m.add_access_profile(profile, code)?;
            info!(match_id, allowed = ?allowed, "Access code added");
        }

        self.db().save_match(&m).await?;
        Ok(())
    }

    /// Stop polling one player's credential.
    pub async fn disable_player(&self, match_id: &str, player: PlayerId) -> Result<()> {
        self.update_credential(match_id, player, |cred| cred.disable())
            .await?;
        info!(match_id, player, "Credential disabled");
        Ok(())
    }

    /// Resume polling a credential that was disabled.
    pub async fn enable_player(&self, match_id: &str, player: PlayerId) -> Result<()> {
        self.update_credential(match_id, player, |cred| cred.operator_reenable(match_id))
            .await
    }

    async fn update_credential(
        &self,
        match_id: &str,
        player: PlayerId,
        update: impl FnOnce(&mut Credential),
    ) -> Result<()> {
        let _guard = self.poller.locks().lock(match_id).await;
        let mut m = self.db().find_match(match_id).await?;
        let cred = m
            .credential_mut(player)
            .ok_or_else(|| Error::NotFound(format!("Player {player} in match {match_id}")))?;
        update(cred);
        self.db().save_match(&m).await?;
        Ok(())
    }

    /// Map a player to a Discord user for mentions, or remove the mapping.
    pub async fn set_discord_user(
        &self,
        match_id: &str,
        player: PlayerId,
        discord_user_id: &str,
        wipe: bool,
    ) -> Result<()> {
        if !wipe && discord_user_id.is_empty() {
            return Err(Error::Validation("Discord user id must not be empty".into()));
        }

        let _guard = self.poller.locks().lock(match_id).await;
        let mut m = self.db().find_match(match_id).await?;
        if wipe {
            m.discord_user_ids.remove(&player);
        } else {
            m.discord_user_ids
                .insert(player, discord_user_id.to_string());
        }
        self.db().save_match(&m).await?;
        info!(match_id, player, wipe, "Discord user updated");
        Ok(())
    }

    /// Check that `presented` may change credentials of `match_id`.
    ///
    /// Unknown matches and matches without access codes are open.
    pub async fn authorize_credential_change(&self, match_id: &str, presented: &str) -> Result<()> {
        match self.db().find_match(match_id).await {
            Ok(m) => {
                m.resolve_visibility(presented)?;
                Ok(())
            }
            Err(npscan_core::db::DatabaseError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// The match as seen by a caller presenting `presented`: only visible
    /// credentials, with API keys and access hashes removed.
    pub async fn visible_match(&self, match_id: &str, presented: &str) -> Result<Match> {
        let mut m = self.db().find_match(match_id).await?;
        let visibility = m.resolve_visibility(presented)?;
        redact(&mut m, &visibility);
        Ok(m)
    }
}

fn redact(m: &mut Match, visibility: &Visibility) {
    m.credentials.retain(|player, _| visibility.can_view(*player));
    for cred in m.credentials.values_mut() {
        cred.api_key.clear();
    }
    m.discord_user_ids
        .retain(|player, _| visibility.can_view(*player));
    m.legacy_access_hash = None;
    m.access_profiles.clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use npscan_core::testing::{SnapshotBuilder, player};

    use super::super::testing::harness;
    use super::*;

    fn view(viewer: PlayerId, now: i64, alias: &str) -> npscan_core::Snapshot {
        SnapshotBuilder::new(viewer, now)
            .name("Orion")
            .player(player(viewer, alias))
            .build()
    }

    #[tokio::test]
    async fn set_credentials_stores_key_and_snapshot() {
        let h = harness().await;
        h.client.stage("k4", view(4, 1000, "Aburrido"));

        let player = h.scanner.set_credentials("100", "k4").await.unwrap();
        assert_eq!(player, 4);

        let m = h.scanner.db().find_match("100").await.unwrap();
        assert_eq!(m.name, "Orion");
        let cred = &m.credentials[&4];
        assert_eq!(cred.api_key, "k4");
        assert_eq!(cred.alias, "Aburrido");
        assert_eq!(cred.latest_snapshot(), Some(1000));
        assert_eq!(cred.last_poll, None);
        assert!(h.scanner.db().find_snapshot("100", 4, 1000).await.is_ok());
    }

    #[tokio::test]
    async fn invalid_key_stores_nothing() {
        let h = harness().await;
        let err = h.scanner.set_credentials("100", "nope").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(h.scanner.db().list_match_ids().await.unwrap().is_empty());

        assert!(matches!(
            h.scanner.set_credentials("100", "").await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn replacing_key_keeps_disabled_state() {
        let h = harness().await;
        h.client.stage("k4", view(4, 1000, "Aburrido"));
        h.scanner.set_credentials("100", "k4").await.unwrap();
        h.scanner.disable_player("100", 4).await.unwrap();

        h.client.stage("k4-new", view(4, 2000, "Aburrido"));
        h.scanner.set_credentials("100", "k4-new").await.unwrap();

        let m = h.scanner.db().find_match("100").await.unwrap();
        let cred = &m.credentials[&4];
        assert_eq!(cred.api_key, "k4-new");
        assert!(cred.is_disabled());
        assert_eq!(cred.latest_snapshot(), Some(2000));
    }

    #[tokio::test]
    async fn disable_and_enable_player() {
        let h = harness().await;
        h.client.stage("k4", view(4, 1000, "Aburrido"));
        h.scanner.set_credentials("100", "k4").await.unwrap();

        h.scanner.disable_player("100", 4).await.unwrap();
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert!(m.credentials[&4].is_disabled());

        h.scanner.enable_player("100", 4).await.unwrap();
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert!(!m.credentials[&4].is_disabled());

        assert!(matches!(
            h.scanner.disable_player("100", 9).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.scanner.enable_player("404", 4).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn protect_restricts_visibility() {
        let h = harness().await;
        h.client.stage("k4", view(4, 1000, "Aburrido"));
        h.client.stage("k6", view(6, 1000, "Burrito"));
        h.scanner.set_credentials("100", "k4").await.unwrap();
        h.scanner.set_credentials("100", "k6").await.unwrap();

        h.scanner.protect("100", "team", &[4], false).await.unwrap();

        let m = h.scanner.visible_match("100", "team").await.unwrap();
        assert_eq!(m.credentials.keys().copied().collect::<Vec<_>>(), vec![4]);
        assert!(m.credentials[&4].api_key.is_empty());
        assert!(m.access_profiles.is_empty());

        assert!(matches!(
            h.scanner.visible_match("100", "wrong").await,
            Err(Error::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn protect_rejects_duplicates_and_wipes() {
        let h = harness().await;
        h.scanner.db().save_match(&Match::new("100")).await.unwrap();

        h.scanner.protect("100", "code", &[], false).await.unwrap();
        assert!(matches!(
            h.scanner.protect("100", "code", &[4], false).await,
            Err(Error::Access(_))
        ));

        h.scanner.protect("100", "", &[], true).await.unwrap();
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert!(!m.has_access_code());

        assert!(matches!(
            h.scanner.protect("100", "", &[], false).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            h.scanner.protect("404", "code", &[], false).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn open_match_shows_every_credential() {
        let h = harness().await;
        h.client.stage("k4", view(4, 1000, "Aburrido"));
        h.scanner.set_credentials("100", "k4").await.unwrap();

        let m = h.scanner.visible_match("100", "").await.unwrap();
        assert_eq!(m.credentials.len(), 1);
        assert!(m.credentials[&4].api_key.is_empty());
    }

    #[tokio::test]
    async fn credential_change_needs_code_once_protected() {
        let h = harness().await;
        h.scanner
            .authorize_credential_change("new", "")
            .await
            .unwrap();

        h.scanner.db().save_match(&Match::new("100")).await.unwrap();
        h.scanner.authorize_credential_change("100", "").await.unwrap();

        h.scanner.protect("100", "code", &[], false).await.unwrap();
        assert!(matches!(
            h.scanner.authorize_credential_change("100", "").await,
            Err(Error::Unauthorized)
        ));
        h.scanner
            .authorize_credential_change("100", "code")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn discord_mapping_set_and_wiped() {
        let h = harness().await;
        h.scanner.db().save_match(&Match::new("100")).await.unwrap();

        h.scanner
            .set_discord_user("100", 4, "1234", false)
            .await
            .unwrap();
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert_eq!(m.discord_user_ids[&4], "1234");

        h.scanner.set_discord_user("100", 4, "", true).await.unwrap();
        let m = h.scanner.db().find_match("100").await.unwrap();
        assert!(m.discord_user_ids.is_empty());

        assert!(matches!(
            h.scanner.set_discord_user("100", 4, "", false).await,
            Err(Error::Validation(_))
        ));
    }
}

//! Tracked matches and their player credentials.

use std::collections::BTreeMap;

use npscan_core::snapshot::PlayerId;
use tracing::warn;

use crate::access::AccessProfile;

/// One tracked game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Game number assigned by Neptune's Pride. Never changes.
    pub id: String,
    /// Display name; empty until the first successful fetch.
    pub name: String,
    pub finished: bool,
    /// Unix seconds of the last poll pass that touched this match.
    pub last_poll: Option<i64>,
    pub credentials: BTreeMap<PlayerId, Credential>,
    /// Single secret from before access profiles existed. Grants full
    /// visibility.
    pub legacy_access_hash: Option<String>,
    /// Checked in order; the first profile that accepts a secret wins.
    pub access_profiles: Vec<AccessProfile>,
    /// Player id to Discord user id, for mention-aware messages.
    pub discord_user_ids: BTreeMap<PlayerId, String>,
}

impl Match {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            finished: false,
            last_poll: None,
            credentials: BTreeMap::new(),
            legacy_access_hash: None,
            access_profiles: Vec::new(),
            discord_user_ids: BTreeMap::new(),
        }
    }

    pub fn credential_mut(&mut self, player: PlayerId) -> Option<&mut Credential> {
        self.credentials.get_mut(&player)
    }
}

/// Polling state of a credential.
///
/// Automated code can only move a credential from `Active` to `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollingState {
    #[default]
    Active,
    Disabled,
}

impl PollingState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "disabled" => Some(Self::Disabled),
            _ => None,
        }
    }
}

/// One player's API key plus its polling bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub player_uid: PlayerId,
    pub alias: String,
    pub api_key: String,
    /// Unix seconds of the last fetch attempt that succeeded.
    pub last_poll: Option<i64>,
    latest_snapshot: i64,
    state: PollingState,
}

impl Credential {
    pub fn new(player_uid: PlayerId, alias: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            player_uid,
            alias: alias.into(),
            api_key: api_key.into(),
            last_poll: None,
            latest_snapshot: 0,
            state: PollingState::Active,
        }
    }

    /// Rebuild a credential from persisted fields.
    pub(crate) const fn restore(
        player_uid: PlayerId,
        alias: String,
        api_key: String,
        last_poll: Option<i64>,
        latest_snapshot: i64,
        state: PollingState,
    ) -> Self {
        Self {
            player_uid,
            alias,
            api_key,
            last_poll,
            latest_snapshot,
            state,
        }
    }

    /// Capture time of the newest stored snapshot, if any.
    pub const fn latest_snapshot(&self) -> Option<i64> {
        if self.latest_snapshot > 0 {
            Some(self.latest_snapshot)
        } else {
            None
        }
    }

    /// Move the watermark forward. Returns `true` if it moved.
    pub fn advance_watermark(&mut self, captured_at: i64) -> bool {
        if captured_at > self.latest_snapshot {
            self.latest_snapshot = captured_at;
            true
        } else {
            false
        }
    }

    pub const fn state(&self) -> PollingState {
        self.state
    }

    pub const fn is_disabled(&self) -> bool {
        matches!(self.state, PollingState::Disabled)
    }

    /// Stop polling this credential.
    pub const fn disable(&mut self) {
        self.state = PollingState::Disabled;
    }

    /// Resume polling a disabled credential. Operator-only.
    pub fn operator_reenable(&mut self, match_id: &str) {
        if self.is_disabled() {
            warn!(
                audit = true,
                match_id,
                player = self.player_uid,
                "Credential re-enabled by operator"
            );
        }
        self.state = PollingState::Active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_only_moves_forward() {
        let mut cred = Credential::new(4, "Aburrido", "key");
        assert_eq!(cred.latest_snapshot(), None);

        assert!(cred.advance_watermark(200));
        assert!(!cred.advance_watermark(100));
        assert!(!cred.advance_watermark(200));
        assert_eq!(cred.latest_snapshot(), Some(200));
    }

    #[test]
    fn disabled_credential_stays_disabled() {
        let mut cred = Credential::new(4, "Aburrido", "key");
        assert_eq!(cred.state(), PollingState::Active);

        cred.disable();
        cred.disable();
        assert!(cred.is_disabled());

        cred.operator_reenable("123");
        assert_eq!(cred.state(), PollingState::Active);
    }

    #[test]
    fn polling_state_string_form() {
        for state in [PollingState::Active, PollingState::Disabled] {
            assert_eq!(PollingState::parse(state.as_str()), Some(state));
        }
        assert_eq!(PollingState::parse("paused"), None);
    }
}

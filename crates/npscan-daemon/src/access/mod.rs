//! Shared-secret access control for matches.
//!
//! A match with no secrets is open to everyone. Otherwise a caller presents a
//! secret which is checked against the legacy single hash first, then against
//! each access profile in stored order.

mod code_hash;

use std::collections::BTreeSet;

use npscan_core::snapshot::PlayerId;
use tracing::warn;

use crate::matches::Match;

pub use code_hash::{access_code_matches, hash_access_code};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("wrong access code")]
    Unauthorized,

    #[error("access profile does not match the given secret")]
    Mismatch,

    #[error("secret already grants access to this match")]
    Duplicate,

    #[error("failed to hash secret: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for AccessError {
    fn from(e: argon2::password_hash::Error) -> Self {
        Self::Hash(e.to_string())
    }
}

/// Which players' data a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    Everyone,
    Players(BTreeSet<PlayerId>),
}

impl Visibility {
    pub fn can_view(&self, player: PlayerId) -> bool {
        match self {
            Self::Everyone => true,
            Self::Players(allowed) => allowed.contains(&player),
        }
    }
}

/// A hashed secret and the visibility it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessProfile {
    pub secret_hash: String,
    pub visibility: Visibility,
}

impl AccessProfile {
    pub fn new(secret: &str, visibility: Visibility) -> Result<Self, AccessError> {
        Ok(Self {
            secret_hash: hash_access_code(secret)?,
            visibility,
        })
    }

    pub fn check_secret(&self, candidate: &str) -> bool {
        check_hash(&self.secret_hash, candidate)
    }
}

fn check_hash(hash: &str, candidate: &str) -> bool {
    access_code_matches(candidate, hash).unwrap_or_else(|e| {
        warn!(error = %e, "Stored access hash is unreadable");
        false
    })
}

impl Match {
    pub const fn has_access_code(&self) -> bool {
        self.legacy_access_hash.is_some() || !self.access_profiles.is_empty()
    }

    /// Resolve what a caller presenting `presented` may see.
    pub fn resolve_visibility(&self, presented: &str) -> Result<Visibility, AccessError> {
        if !self.has_access_code() {
            return Ok(Visibility::Everyone);
        }

        if let Some(hash) = &self.legacy_access_hash {
            if check_hash(hash, presented) {
                return Ok(Visibility::Everyone);
            }
        }

        self.access_profiles
            .iter()
            .find(|profile| profile.check_secret(presented))
            .map(|profile| profile.visibility.clone())
            .ok_or(AccessError::Unauthorized)
    }

    /// Append a profile, rejecting secrets that do not match it or that
    /// already open this match.
    pub fn add_access_profile(
        &mut self,
        profile: AccessProfile,
        plaintext: &str,
    ) -> Result<(), AccessError> {
        if !profile.check_secret(plaintext) {
            return Err(AccessError::Mismatch);
        }

        let legacy_hit = self
            .legacy_access_hash
            .as_deref()
            .is_some_and(|hash| check_hash(hash, plaintext));
        if legacy_hit || self.access_profiles.iter().any(|p| p.check_secret(plaintext)) {
            return Err(AccessError::Duplicate);
        }

        self.access_profiles.push(profile);
        Ok(())
    }

    pub fn wipe_access_codes(&mut self) {
        self.legacy_access_hash = None;
        self.access_profiles.clear();
    }
}

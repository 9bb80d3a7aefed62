//! Error type shared by the daemon's operations.

use npscan_core::db::DatabaseError;
use npscan_core::multierror::{Aggregate, MultiError};
use npscan_core::snapshot::PlayerId;

use crate::access::AccessError;
use crate::notifications::NotificationError;
use crate::npapi::ClientError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("wrong access code")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] ClientError),

    #[error("storage error: {0}")]
    Storage(DatabaseError),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("no snapshots loaded")]
    NothingToMerge,

    #[error("notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("access error: {0}")]
    Access(AccessError),

    #[error("{context}: {source} | [match={match_id}] [player={player:?}]")]
    Poll {
        match_id: String,
        player: Option<PlayerId>,
        context: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("{0}")]
    Multiple(MultiError<Error>),
}

impl Error {
    pub(crate) fn poll(
        match_id: &str,
        player: Option<PlayerId>,
        context: &'static str,
        source: impl Into<Self>,
    ) -> Self {
        Self::Poll {
            match_id: match_id.to_string(),
            player,
            context,
            source: Box::new(source.into()),
        }
    }
}

impl From<DatabaseError> for Error {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

impl From<AccessError> for Error {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Unauthorized => Self::Unauthorized,
            other => Self::Access(other),
        }
    }
}

impl Aggregate for Error {
    fn aggregate(errors: MultiError<Self>) -> Self {
        Self::Multiple(errors)
    }
}

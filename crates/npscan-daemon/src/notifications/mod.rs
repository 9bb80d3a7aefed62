//! Notification delivery with at-most-once bookkeeping.
//!
//! - [`Notifiable`] is anything with a stable identity that can be rendered
//! - [`Sink`] delivers rendered messages ([`NilSink`], [`DiscordWebhookSink`])
//! - [`NotificationGuard`] remembers which identities were delivered
//! - [`send_guarded`] ties the three together

mod dispatch;
mod guard;
mod sink;

pub use dispatch::{DispatchReport, send_guarded};
pub use guard::{NotificationDatabase, NotificationGuard};
pub use sink::{DiscordWebhookSink, NilSink, Sink};

use npscan_core::db::DatabaseError;
use npscan_core::multierror::{Aggregate, MultiError};

/// Errors that can occur in the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// HTTP request to the sink failed.
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The sink answered with an error status.
    #[error("{sink} returned status {status}")]
    Status { sink: &'static str, status: u16 },

    /// Delivery record could not be read or written.
    #[error("delivery record error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Multiple(MultiError<NotificationError>),
}

impl Aggregate for NotificationError {
    fn aggregate(errors: MultiError<Self>) -> Self {
        Self::Multiple(errors)
    }
}

/// How a sink wants messages rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    #[default]
    Plain,
    /// Players with a known chat account are rendered as mentions.
    ChatMentions,
}

/// Something worth telling people about, exactly once.
pub trait Notifiable: Send + Sync {
    /// Stable identity. Two notifiables with the same id are the same event.
    fn id(&self) -> String;

    fn render(&self, style: RenderStyle) -> String;
}

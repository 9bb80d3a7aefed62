//! Guarded dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use npscan_core::multierror::collapse;
use tracing::{debug, info, warn};

use super::{Notifiable, NotificationError, NotificationGuard, Sink};

/// What a dispatch pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Notifiables delivered through every sink and recorded.
    pub sent: usize,
    /// Notifiables that were already recorded.
    pub skipped: usize,
}

/// Deliver every notifiable that has not been delivered before.
///
/// A notifiable is recorded only when every sink accepted it, so partial
/// failures are retried on the next pass. Errors are collected and do not
/// stop the remaining notifiables. `pacing` is slept after every delivery
/// attempt.
pub async fn send_guarded<G, N>(
    guard: &G,
    notifiables: &[N],
    sinks: &[Arc<dyn Sink>],
    pacing: Duration,
) -> Result<DispatchReport, NotificationError>
where
    G: NotificationGuard + ?Sized,
    N: Notifiable,
{
    let mut report = DispatchReport::default();
    let mut errors = Vec::new();

    for notifiable in notifiables {
        let id = notifiable.id();

        match guard.check_sent(&id).await {
            Ok(true) => {
                debug!(id = %id, "Notification already sent");
                report.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                errors.push(e);
                continue;
            }
        }

        let mut delivered = true;
        for sink in sinks {
            let message = notifiable.render(sink.render_style());
            if let Err(e) = sink.send(&message).await {
                warn!(id = %id, sink = sink.name(), error = %e, "Notification delivery failed");
                errors.push(e);
                delivered = false;
            }
        }

        if delivered {
            match guard.record_sent(&id).await {
                Ok(()) => {
                    info!(id = %id, "Notification sent");
                    report.sent += 1;
                }
                Err(e) => errors.push(e),
            }
        }

        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    collapse(errors)?;
    Ok(report)
}

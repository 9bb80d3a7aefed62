//! Per-match write locks.
//!
//! The match record is saved as a whole, so two concurrent
//! read-modify-write cycles on the same match would drop one side's
//! changes. Every mutating operation holds the match's lock for its whole
//! cycle. Different matches never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Clone, Default)]
pub struct MatchLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl MatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a match.
    pub async fn lock(&self, match_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(match_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_match_is_exclusive() {
        let locks = MatchLocks::new();
        let held = locks.lock("1").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_matches_do_not_contend() {
        let locks = MatchLocks::new();
        let _one = locks.lock("1").await;
        tokio::time::timeout(Duration::from_millis(100), locks.lock("2"))
            .await
            .unwrap();
    }
}

//! Health & Recovery: periodic resurrection of deactivated identities.
//!
//! No automatic timer is mandated — `recover_failed` on [`crate::store::IdentityStore`]
//! is a plain, synchronous operation callers may invoke from an admin action.
//! This module additionally offers the scheduled-background-task flavor the
//! rest of this codebase always reaches for when something should happen
//! "periodically" rather than leaving it to an external cron.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::store::IdentityStore;

/// Spawns a background task that calls `recover()` on a fixed interval.
/// The first tick is skipped so recovery does not fire immediately at
/// startup, when nothing has had a chance to fail yet.
pub fn spawn_recovery_task(store: Arc<IdentityStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let recovered = store.recover();
            if recovered > 0 {
                info!(recovered, "reactivated deactivated identities");
            }
        }
    })
}

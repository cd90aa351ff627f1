use crate::localizations::LocalizationCache;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to the background refresh loop.
///
/// The loop lives as long as the handle: dropping it stops the loop just
/// like [`RefreshTask::stop`].
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop scheduling further cycles. A cycle already in flight is dropped.
    pub fn stop(self) {
        info!("Refresh loop stopped");
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start the recurring refresh loop.
///
/// The next cycle is scheduled `keep_alive` after the previous one finished,
/// so slow cycles push the schedule back instead of overlapping.
pub fn spawn_refresh_loop(cache: Arc<LocalizationCache>) -> RefreshTask {
    let keep_alive = cache.keep_alive();
    info!("Scheduling localization refresh every {:?}", keep_alive);

    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(keep_alive).await;
            debug!("⏰ Refresh cycle triggered");
            cache.refresh_all().await;
        }
    });

    RefreshTask { handle }
}

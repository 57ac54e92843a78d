//! Graceful shutdown coordination.

use super::RenderQueue;
use crate::error::Result;
use crate::types::{Event, TaskStatus};
use std::time::Duration;
use tracing::{info, warn};

/// How long shutdown waits for in-flight generation calls to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl RenderQueue {
    /// Gracefully shut down the engine
    ///
    /// Performs the shutdown sequence:
    /// 1. Stops accepting new tasks (enqueue and retry return `ShuttingDown`)
    /// 2. Cancels the admission loop, so nothing pending is admitted anymore
    /// 3. Waits for in-flight generation calls to finish, with a 30 second
    ///    timeout (a hung call cannot be aborted, only abandoned)
    /// 4. Emits the `Shutdown` event
    ///
    /// Pending tasks remain `Pending` in the store; the queue is not
    /// persisted across restarts.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown");

        self.scheduler
            .accepting_new
            .store(false, std::sync::atomic::Ordering::SeqCst);
        info!("Stopped accepting new tasks");

        self.scheduler.cancel.cancel();
        info!("Admission loop cancelled");

        let wait_result =
            tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_in_flight()).await;
        match wait_result {
            Ok(()) => info!("All in-flight tasks finished"),
            Err(_) => warn!("Timeout waiting for in-flight tasks, proceeding with shutdown"),
        }

        self.emit_event(Event::Shutdown);
        info!("Graceful shutdown complete");
        Ok(())
    }

    /// Poll until no task is `Processing` anymore
    async fn wait_for_in_flight(&self) {
        loop {
            let in_flight = {
                let store = self.store.lock().await;
                store.count(TaskStatus::Processing)
            };
            if in_flight == 0 {
                return;
            }
            tracing::debug!(in_flight, "Waiting for in-flight tasks to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

//! Admission loop — enforces the concurrency cap and FIFO order.

use super::RenderQueue;
use super::executor::{GenerationTaskContext, run_generation_task};
use crate::types::Event;
use std::sync::Arc;
use tracing::debug;

impl RenderQueue {
    /// Start the admission loop
    ///
    /// Spawns a background task that wakes on every scheduler tick and on
    /// every store mutation, and per wakeup:
    /// 1. Does nothing if `Processing` tasks already fill the concurrency cap
    /// 2. Otherwise claims the single oldest `Pending` task (the claim marks
    ///    it `Processing` under the store mutex, so overlapping wakeups can
    ///    never admit the same task or overshoot the cap)
    /// 3. Spawns an executor for the claimed task and returns to waiting
    ///
    /// A successful claim re-signals the loop, so a backlog drains one
    /// admission at a time up to the cap without waiting for the next tick.
    /// The tick is a liveness fallback, not the admission latency.
    ///
    /// The loop runs until [`shutdown`](Self::shutdown) cancels it.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(engine.queue_config.tick_interval());
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = engine.scheduler.cancel.cancelled() => {
                        debug!("Admission loop cancelled");
                        break;
                    }
                    _ = tick.tick() => {}
                    _ = engine.scheduler.notify.notified() => {}
                }
                engine.admit_next().await;
            }
        })
    }

    /// Admit at most one pending task, respecting the concurrency cap
    pub(crate) async fn admit_next(&self) {
        let claimed = {
            let mut store = self.store.lock().await;
            if store.count(crate::types::TaskStatus::Processing)
                >= self.queue_config.max_concurrent_tasks
            {
                return;
            }
            store.claim_next_pending()
        };

        let Some(task) = claimed else {
            return;
        };

        debug!(task_id = %task.id, "Task admitted");
        self.emit_event(Event::Started {
            id: task.id.clone(),
        });

        // Immutable snapshot: a config change never affects this dispatch
        let config = self.generation_config.read().await.clone();

        let ctx = GenerationTaskContext {
            task,
            config,
            client: Arc::clone(&self.client),
            engine: self.clone(),
        };
        tokio::spawn(async move {
            run_generation_task(ctx).await;
        });

        // The claim freed a pending slot from the queue's point of view;
        // wake again in case more tasks fit under the cap
        self.notify_store_changed();
    }
}

//! Single generation attempt execution.

use super::RenderQueue;
use crate::client::GenerationClient;
use crate::config::GenerationConfig;
use crate::error::Error;
use crate::store::Transition;
use crate::types::{Event, Task, TaskId};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything one generation attempt needs, captured at dispatch time
pub(crate) struct GenerationTaskContext {
    /// The claimed task (already `Processing` in the store)
    pub(crate) task: Task,
    /// Config snapshot taken at dispatch; later config changes do not apply
    pub(crate) config: GenerationConfig,
    /// Client performing the actual call
    pub(crate) client: Arc<dyn GenerationClient>,
    /// Engine handle for the final transition and event
    pub(crate) engine: RenderQueue,
}

/// Run one generation attempt to completion.
///
/// Invokes the client exactly once and records the outcome. Failures are
/// terminal for this task identity (retry is an explicit re-enqueue under a
/// new id) and never propagate out of this function — a failed task must
/// not take the admission loop down with it.
pub(crate) async fn run_generation_task(ctx: GenerationTaskContext) {
    let id = ctx.task.id.clone();

    match ctx.client.generate(&ctx.task, &ctx.config).await {
        Ok(result_url) => {
            info!(task_id = %id, "Generation completed");
            ctx.engine
                .apply_transition(&id, Transition::Completed(result_url))
                .await;
        }
        Err(err) => {
            warn!(task_id = %id, error = %err, "Generation failed");
            ctx.engine
                .apply_transition(&id, Transition::Failed(err.to_string()))
                .await;
        }
    }
}

impl RenderQueue {
    /// Record a task's final transition and emit the matching event.
    ///
    /// A `NotFound` here means the task was cleared mid-flight; the outcome
    /// is logged and dropped. Any other transition failure indicates a bug
    /// in the state machine and is logged at error level. Either way the
    /// admission loop is nudged, since a `Processing` slot just freed up.
    pub(crate) async fn apply_transition(&self, id: &TaskId, transition: Transition) {
        let result = {
            let mut store = self.store.lock().await;
            store.transition(id, transition)
        };

        match result {
            Ok(task) => {
                let event = match task.status {
                    crate::types::TaskStatus::Completed => Event::Completed {
                        id: task.id.clone(),
                        result_url: task.result_url.clone().unwrap_or_default(),
                    },
                    crate::types::TaskStatus::Failed => Event::Failed {
                        id: task.id.clone(),
                        error: task.error.clone().unwrap_or_default(),
                    },
                    _ => return,
                };
                self.emit_event(event);
            }
            Err(Error::NotFound(_)) => {
                warn!(task_id = %id, "Task cleared mid-flight, dropping its outcome");
            }
            Err(err) => {
                error!(task_id = %id, error = %err, "Failed to record task outcome");
            }
        }

        self.notify_store_changed();
    }
}

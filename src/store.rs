//! The task store — the authoritative collection of tasks and their state.
//!
//! Pure data and mutation operations, no I/O and no locking. The engine owns
//! the single instance behind a `tokio::sync::Mutex`, which makes every
//! operation here — in particular [`TaskStore::claim_next_pending`], the
//! "read pending + mark processing" step — genuinely atomic as far as any
//! reader of the store is concerned.

use crate::error::{Error, Result};
use crate::types::{QueueStats, Task, TaskId, TaskSource, TaskStatus};
use chrono::Utc;

/// Parameters for inserting a new task
#[derive(Clone, Debug)]
pub struct NewTask {
    /// Prompt text (validated non-empty by the caller)
    pub prompt: String,

    /// Ordered reference image payloads
    pub reference_images: Vec<String>,

    /// Source filename for image-derived tasks
    pub original_filename: Option<String>,

    /// Where the task came from (determines the id prefix)
    pub source: TaskSource,
}

/// A status change applied as one atomic whole-record replace
#[derive(Clone, Debug)]
pub enum Transition {
    /// Claimed by an executor
    Processing,
    /// Generation succeeded with this result handle
    Completed(String),
    /// Generation failed with this message
    Failed(String),
}

impl Transition {
    fn target_status(&self) -> TaskStatus {
        match self {
            Transition::Processing => TaskStatus::Processing,
            Transition::Completed(_) => TaskStatus::Completed,
            Transition::Failed(_) => TaskStatus::Failed,
        }
    }
}

/// FIFO-ordered task collection with atomic status transitions
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    next_seq: u64,
}

impl TaskStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new `Pending` task in FIFO order, assigning its id
    pub fn insert(&mut self, new: NewTask) -> Task {
        self.next_seq += 1;
        let task = Task {
            id: TaskId::generate(new.source, self.next_seq),
            prompt: new.prompt,
            reference_images: new.reference_images,
            status: TaskStatus::Pending,
            result_url: None,
            error: None,
            original_filename: new.original_filename,
            created_at: Utc::now(),
            seq: self.next_seq,
        };
        self.tasks.push(task.clone());
        task
    }

    /// Atomically replace a task's status fields.
    ///
    /// Status, result and error are replaced as a unit — no partial update is
    /// ever visible to readers. Fails with [`Error::NotFound`] if the id no
    /// longer exists (e.g. cleared mid-flight) and with
    /// [`Error::InvalidState`] if the transition would leave the
    /// `Pending → Processing → {Completed, Failed}` state machine.
    pub fn transition(&mut self, id: &TaskId, transition: Transition) -> Result<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;

        let legal = matches!(
            (task.status, &transition),
            (TaskStatus::Pending, Transition::Processing)
                | (TaskStatus::Processing, Transition::Completed(_))
                | (TaskStatus::Processing, Transition::Failed(_))
        );
        if !legal {
            return Err(Error::InvalidState {
                id: id.clone(),
                operation: format!("transition to {}", transition.target_status()),
                current_status: task.status,
            });
        }

        task.status = transition.target_status();
        match transition {
            Transition::Processing => {
                task.result_url = None;
                task.error = None;
            }
            Transition::Completed(url) => {
                task.result_url = Some(url);
                task.error = None;
            }
            Transition::Failed(message) => {
                task.result_url = None;
                task.error = Some(message);
            }
        }
        Ok(task.clone())
    }

    /// Number of tasks with the given status
    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Total number of tasks in the store
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Snapshot of tasks, optionally filtered by status, in insertion order
    pub fn list(&self, filter: Option<TaskStatus>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| filter.is_none_or(|s| t.status == s))
            .cloned()
            .collect()
    }

    /// Look up one task by id
    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// The oldest `Pending` task by insertion order, if any
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Pending)
    }

    /// Claim the oldest `Pending` task: find it and mark it `Processing` in
    /// one call. This is the optimistic claim that grants exclusive
    /// ownership to one executor — under the engine's store mutex, two
    /// overlapping scheduler wakeups can never claim the same task.
    pub fn claim_next_pending(&mut self) -> Option<Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.status == TaskStatus::Pending)?;
        task.status = TaskStatus::Processing;
        Some(task.clone())
    }

    /// Remove every task except those currently `Processing`, so an in-flight
    /// generation call is never orphaned from the store. Returns how many
    /// tasks were removed.
    pub fn clear_except_processing(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.status == TaskStatus::Processing);
        before - self.tasks.len()
    }

    /// Remove one task by id, returning it if it existed
    pub fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let index = self.tasks.iter().position(|t| &t.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Completed tasks that carry a result handle, in queue order —
    /// the input set for an export run
    pub fn completed_with_results(&self) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed && t.result_url.is_some())
            .cloned()
            .collect()
    }

    /// Statistics snapshot
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total: self.tasks.len(),
            pending: self.count(TaskStatus::Pending),
            processing: self.count(TaskStatus::Processing),
            completed: self.count(TaskStatus::Completed),
            failed: self.count(TaskStatus::Failed),
        }
    }
}

//! Core types for renderq

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a generation task
///
/// Ids are generated by the task store as `{prefix}_{seq}`, where the prefix
/// encodes the task source and `seq` is a monotonic counter. A retry always
/// receives a fresh id — a failed task and its retry are never the same
/// identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn generate(source: TaskSource, seq: u64) -> Self {
        Self(format!("{}_{}", source.prefix(), seq))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where a task came from — determines its id prefix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    /// Entered directly as a single prompt
    Single,
    /// Promoted from a staged text batch
    TextBatch,
    /// Promoted from a staged image batch
    ImageBatch,
    /// Re-enqueued copy of a failed task
    Retry,
}

impl TaskSource {
    /// Id prefix for tasks of this source
    pub fn prefix(&self) -> &'static str {
        match self {
            TaskSource::Single => "sgl",
            TaskSource::TextBatch => "txt",
            TaskSource::ImageBatch => "img",
            TaskSource::Retry => "retry",
        }
    }
}

/// Task lifecycle status
///
/// Transitions run only along `Pending → Processing → {Completed, Failed}`.
/// `Failed → Pending` never happens in place; retry deletes the record and
/// inserts a fresh `Pending` task under a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for the scheduler to admit it
    Pending,
    /// Claimed by an executor, generation call in flight
    Processing,
    /// Generation succeeded, result handle recorded
    Completed,
    /// Generation failed, error message recorded
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One unit of generation work with its own lifecycle and result
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,

    /// Text description sent to the rendering service (never empty)
    pub prompt: String,

    /// Ordered reference image payloads, consumed positionally by the model.
    /// Payloads arrive already encoded; this crate never converts files.
    pub reference_images: Vec<String>,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Result handle (URL or inline payload); present iff status is Completed
    pub result_url: Option<String>,

    /// Human-readable failure message; present iff status is Failed
    pub error: Option<String>,

    /// Source filename for tasks derived from a loaded image file.
    /// Used for export naming.
    pub original_filename: Option<String>,

    /// When the task was enqueued
    pub created_at: DateTime<Utc>,

    /// Monotonic insertion order, the FIFO key for admission
    pub(crate) seq: u64,
}

impl Task {
    /// Name used in logs — the original filename when available, else the id
    pub fn display_name(&self) -> &str {
        self.original_filename
            .as_deref()
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// Event emitted during the task lifecycle and export runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the queue
    Queued {
        /// Task ID
        id: TaskId,
        /// Prompt text
        prompt: String,
    },

    /// Task claimed by an executor, generation call starting
    Started {
        /// Task ID
        id: TaskId,
    },

    /// Generation succeeded
    Completed {
        /// Task ID
        id: TaskId,
        /// Result handle returned by the service
        result_url: String,
    },

    /// Generation failed
    Failed {
        /// Task ID
        id: TaskId,
        /// Failure message
        error: String,
    },

    /// Failed task re-enqueued under a new identity
    Retried {
        /// Id of the removed failed record
        old_id: TaskId,
        /// Id of the fresh pending record
        new_id: TaskId,
    },

    /// Queue cleared (in-flight tasks preserved)
    QueueCleared {
        /// Number of tasks removed
        removed: usize,
    },

    /// Generation config replaced at runtime
    ConfigUpdated,

    /// Bulk export started
    ExportStarted {
        /// Number of completed tasks in the run
        total: usize,
    },

    /// One item could not be fetched/written during export (non-fatal)
    ExportItemSkipped {
        /// Task ID of the skipped item
        id: TaskId,
        /// Why it was skipped
        error: String,
    },

    /// Bulk export finished
    ExportFinished {
        /// Number of results persisted
        written: usize,
        /// Strategy that produced the output
        strategy: ExportStrategy,
    },

    /// Export aborted by the user before any writes
    ExportCancelled,

    /// Graceful shutdown initiated
    Shutdown,
}

/// One of the two mutually exclusive methods of persisting completed results
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// One file per task written into a granted directory
    Directory,
    /// A single zip archive containing all fetchable results
    Archive,
}

impl std::fmt::Display for ExportStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportStrategy::Directory => write!(f, "directory"),
            ExportStrategy::Archive => write!(f, "archive"),
        }
    }
}

/// Queue statistics snapshot
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total number of tasks in the store
    pub total: usize,

    /// Tasks waiting for admission
    pub pending: usize,

    /// Tasks with a generation call in flight
    pub processing: usize,

    /// Tasks that finished successfully
    pub completed: usize,

    /// Tasks that failed (retryable)
    pub failed: usize,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    // --- TaskId generation ---

    #[test]
    fn task_id_encodes_source_prefix_and_sequence() {
        let cases = [
            (TaskSource::Single, 1, "sgl_1"),
            (TaskSource::TextBatch, 7, "txt_7"),
            (TaskSource::ImageBatch, 100, "img_100"),
            (TaskSource::Retry, 42, "retry_42"),
        ];

        for (source, seq, expected) in cases {
            let id = TaskId::generate(source, seq);
            assert_eq!(
                id.as_str(),
                expected,
                "{source:?} with seq {seq} should produce {expected}"
            );
        }
    }

    #[test]
    fn task_id_display_matches_inner_value() {
        let id = TaskId::from("sgl_9");
        assert_eq!(id.to_string(), "sgl_9");
    }

    #[test]
    fn task_id_serializes_as_plain_string() {
        let id = TaskId::from("img_3");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(
            json, "\"img_3\"",
            "serde(transparent) should serialize the inner string directly"
        );
    }

    // --- TaskStatus ---

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::Failed.to_string(), "failed");
    }

    // --- Task helpers ---

    fn sample_task(original_filename: Option<&str>) -> Task {
        Task {
            id: TaskId::from("img_1"),
            prompt: "a banana in space".to_string(),
            reference_images: vec![],
            status: TaskStatus::Pending,
            result_url: None,
            error: None,
            original_filename: original_filename.map(str::to_string),
            created_at: Utc::now(),
            seq: 1,
        }
    }

    #[test]
    fn display_name_prefers_original_filename() {
        let task = sample_task(Some("photo.png"));
        assert_eq!(task.display_name(), "photo.png");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let task = sample_task(None);
        assert_eq!(task.display_name(), "img_1");
    }

    // --- Event serialization ---

    #[test]
    fn event_serializes_with_snake_case_type_tag() {
        let event = Event::ExportFinished {
            written: 3,
            strategy: ExportStrategy::Archive,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "export_finished");
        assert_eq!(json["written"], 3);
        assert_eq!(json["strategy"], "archive");
    }
}

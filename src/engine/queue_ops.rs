//! Enqueue, clear, retry and snapshot operations.

use super::RenderQueue;
use crate::error::{Error, Result};
use crate::staging::{StagedFile, StagedText};
use crate::store::NewTask;
use crate::types::{Event, QueueStats, Task, TaskId, TaskSource, TaskStatus};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

impl RenderQueue {
    /// Enqueue one task from a direct prompt.
    ///
    /// Blank prompts are rejected with [`Error::Validation`] before any task
    /// record exists. `reference_images` are passed through to the rendering
    /// service in order.
    pub async fn enqueue_single(
        &self,
        prompt: impl Into<String>,
        reference_images: Vec<String>,
    ) -> Result<TaskId> {
        self.ensure_accepting()?;
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(Error::Validation("prompt must not be empty".to_string()));
        }

        let task = self
            .insert_task(NewTask {
                prompt,
                reference_images,
                original_filename: None,
                source: TaskSource::Single,
            })
            .await;
        Ok(task.id)
    }

    /// Enqueue one task per staged text prompt.
    ///
    /// Blank prompts are dropped silently; the returned ids cover only the
    /// prompts that became tasks. The shared `reference_images` are attached
    /// to every task.
    pub async fn enqueue_text_batch(
        &self,
        items: Vec<StagedText>,
        reference_images: Vec<String>,
    ) -> Result<Vec<TaskId>> {
        self.ensure_accepting()?;

        let mut ids = Vec::new();
        for item in items {
            if item.prompt.trim().is_empty() {
                continue;
            }
            let task = self
                .insert_task(NewTask {
                    prompt: item.prompt,
                    reference_images: reference_images.clone(),
                    original_filename: None,
                    source: TaskSource::TextBatch,
                })
                .await;
            ids.push(task.id);
        }
        info!(queued = ids.len(), "Text batch queued");
        Ok(ids)
    }

    /// Enqueue one task per staged image file.
    ///
    /// Files without a ready payload are skipped. A blank prompt defaults to
    /// `"Untitled"`. Each task's references are the shared `reference_images`
    /// followed by the file's own payload, and the original filename is
    /// recorded for export naming.
    pub async fn enqueue_image_batch(
        &self,
        items: Vec<StagedFile>,
        reference_images: Vec<String>,
    ) -> Result<Vec<TaskId>> {
        self.ensure_accepting()?;

        let mut ids = Vec::new();
        for item in items {
            let Some(payload) = item.payload else {
                debug!(
                    filename = %item.original_filename,
                    "Skipping staged file without a ready payload"
                );
                continue;
            };
            let prompt = if item.prompt.trim().is_empty() {
                "Untitled".to_string()
            } else {
                item.prompt
            };
            let mut refs = reference_images.clone();
            refs.push(payload);

            let task = self
                .insert_task(NewTask {
                    prompt,
                    reference_images: refs,
                    original_filename: Some(item.original_filename),
                    source: TaskSource::ImageBatch,
                })
                .await;
            ids.push(task.id);
        }
        info!(queued = ids.len(), "Image batch queued");
        Ok(ids)
    }

    /// Remove all tasks except those currently `Processing`.
    ///
    /// In-flight generation calls keep their store records so their final
    /// transition still has a home; a later clear removes them once finished.
    /// Returns how many tasks were removed.
    pub async fn clear_queue(&self) -> usize {
        let removed = {
            let mut store = self.store.lock().await;
            store.clear_except_processing()
        };
        info!(removed, "Queue cleared");
        self.emit_event(Event::QueueCleared { removed });
        self.notify_store_changed();
        removed
    }

    /// Re-enqueue a failed task under a new identity.
    ///
    /// The failed record is removed and a fresh `Pending` task is inserted
    /// with the same prompt, references and original filename but a new id.
    /// Only `Failed` tasks are retryable.
    pub async fn retry(&self, id: &TaskId) -> Result<TaskId> {
        self.ensure_accepting()?;

        let (old_id, task) = {
            let mut store = self.store.lock().await;
            let current = store.get(id).ok_or_else(|| Error::NotFound(id.clone()))?;
            if current.status != TaskStatus::Failed {
                return Err(Error::InvalidState {
                    id: id.clone(),
                    operation: "retry".to_string(),
                    current_status: current.status,
                });
            }
            // The get above proved the id exists; remove cannot miss under
            // the same lock
            let old = store.remove(id).ok_or_else(|| Error::NotFound(id.clone()))?;
            let task = store.insert(NewTask {
                prompt: old.prompt,
                reference_images: old.reference_images,
                original_filename: old.original_filename,
                source: TaskSource::Retry,
            });
            (old.id, task)
        };

        info!(old_id = %old_id, new_id = %task.id, "Task re-enqueued");
        self.emit_event(Event::Retried {
            old_id,
            new_id: task.id.clone(),
        });
        self.notify_store_changed();
        Ok(task.id)
    }

    /// Snapshot of tasks, optionally filtered by status, in queue order
    pub async fn list_tasks(&self, filter: Option<TaskStatus>) -> Vec<Task> {
        self.store.lock().await.list(filter)
    }

    /// Look up one task by id
    pub async fn get_task(&self, id: &TaskId) -> Option<Task> {
        self.store.lock().await.get(id).cloned()
    }

    /// Queue statistics snapshot
    pub async fn stats(&self) -> QueueStats {
        self.store.lock().await.stats()
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.scheduler.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    async fn insert_task(&self, new: NewTask) -> Task {
        let task = {
            let mut store = self.store.lock().await;
            store.insert(new)
        };
        debug!(task_id = %task.id, name = %task.display_name(), "Task queued");
        self.emit_event(Event::Queued {
            id: task.id.clone(),
            prompt: task.prompt.clone(),
        });
        self.notify_store_changed();
        task
    }
}

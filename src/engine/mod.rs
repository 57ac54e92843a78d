//! Core engine implementation split into focused submodules.
//!
//! The `RenderQueue` struct and its methods are organized by domain:
//! - [`queue_ops`] - Enqueue, clear, retry and snapshot operations
//! - [`scheduler`] - Admission loop (concurrency cap + FIFO)
//! - [`executor`] - Single generation attempt execution
//! - [`lifecycle`] - Graceful shutdown coordination
//! - [`export`] - Bulk export orchestration

mod executor;
mod export;
mod lifecycle;
mod queue_ops;
mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use export::{DirectoryPicker, ExportOutcome, ExportReport};

use crate::client::{GenerationClient, HttpGenerationClient, ResultFetcher};
use crate::config::{Config, ExportConfig, GenerationConfig, QueueConfig};
use crate::store::TaskStore;
use crate::types::Event;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Scheduler coordination state
#[derive(Clone)]
pub(crate) struct SchedulerState {
    /// Store-mutation signal; every queue mutation nudges the admission loop
    pub(crate) notify: Arc<tokio::sync::Notify>,
    /// Cancels the admission loop during shutdown
    pub(crate) cancel: tokio_util::sync::CancellationToken,
    /// Flag to indicate whether new tasks are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            notify: Arc::new(tokio::sync::Notify::new()),
            cancel: tokio_util::sync::CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Main engine instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct RenderQueue {
    /// Task store (single mutex makes claim + transition atomic to readers)
    pub(crate) store: Arc<tokio::sync::Mutex<TaskStore>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Rendering service settings, replaceable at runtime.
    /// Executors take a snapshot at dispatch, never hold the lock.
    pub(crate) generation_config: Arc<tokio::sync::RwLock<GenerationConfig>>,
    /// Scheduler settings (immutable after construction)
    pub(crate) queue_config: QueueConfig,
    /// Export settings (immutable after construction)
    pub(crate) export_config: ExportConfig,
    /// Generation client invoked once per claimed task
    pub(crate) client: Arc<dyn GenerationClient>,
    /// Result fetcher used by export runs
    pub(crate) fetcher: Arc<dyn ResultFetcher>,
    /// Scheduler coordination state
    pub(crate) scheduler: SchedulerState,
    /// Export serialization flag; at most one export run at a time
    pub(crate) export_busy: Arc<AtomicBool>,
}

impl RenderQueue {
    /// Create an engine backed by the HTTP generation client
    pub fn new(config: Config) -> Self {
        let client = Arc::new(HttpGenerationClient::new());
        Self::with_client(config, client.clone(), client)
    }

    /// Create an engine with injected client and fetcher implementations.
    ///
    /// This is the seam for tests and for callers that talk to a
    /// non-HTTP rendering backend.
    pub fn with_client(
        config: Config,
        client: Arc<dyn GenerationClient>,
        fetcher: Arc<dyn ResultFetcher>,
    ) -> Self {
        // Buffer of 1000 events; multiple subscribers receive all events independently
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Self {
            store: Arc::new(tokio::sync::Mutex::new(TaskStore::new())),
            event_tx,
            generation_config: Arc::new(tokio::sync::RwLock::new(config.generation)),
            queue_config: config.queue,
            export_config: config.export,
            client,
            fetcher,
            scheduler: SchedulerState::new(),
            export_busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to engine events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events
    /// independently. Events are buffered, but if a subscriber falls behind by
    /// more than 1000 events, it will receive a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the current rendering service settings
    pub async fn generation_config(&self) -> GenerationConfig {
        self.generation_config.read().await.clone()
    }

    /// Replace the rendering service settings at runtime.
    ///
    /// Tasks whose generation call is already in flight keep the snapshot they
    /// were dispatched with; only later dispatches see the new settings.
    pub async fn update_generation_config(&self, config: GenerationConfig) {
        *self.generation_config.write().await = config;
        tracing::info!("Generation config updated");
        self.emit_event(Event::ConfigUpdated);
    }

    /// Scheduler settings
    pub fn queue_config(&self) -> &QueueConfig {
        &self.queue_config
    }

    /// Export settings
    pub fn export_config(&self) -> &ExportConfig {
        &self.export_config
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped
    /// (ok() converts Err to None). Task processing continues even if no one
    /// is listening to events.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Nudge the admission loop after a store mutation
    pub(crate) fn notify_store_changed(&self) {
        self.scheduler.notify.notify_one();
    }
}

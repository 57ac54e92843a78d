//! Shared test helpers for creating RenderQueue instances in tests.

use crate::client::{GenerationClient, ResultFetcher};
use crate::config::{Config, GenerationConfig, QueueConfig};
use crate::engine::{DirectoryPicker, RenderQueue};
use crate::error::GenerateError;
use crate::store::{NewTask, Transition};
use crate::types::{Task, TaskSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Test config with a fast tick so scheduler tests don't wait on the
/// 500ms production default
pub(crate) fn test_config(max_concurrent: usize) -> Config {
    Config {
        queue: QueueConfig {
            max_concurrent_tasks: max_concurrent,
            tick_interval_ms: 20,
        },
        generation: GenerationConfig {
            api_key: "sk-test".to_string(),
            ..GenerationConfig::default()
        },
        ..Config::default()
    }
}

/// Engine wired to the given client, with an empty stub fetcher
pub(crate) fn create_test_queue(
    max_concurrent: usize,
    client: Arc<dyn GenerationClient>,
) -> RenderQueue {
    RenderQueue::with_client(test_config(max_concurrent), client, Arc::new(StubFetcher::new()))
}

/// Insert a task directly into the store and drive it to Completed,
/// bypassing the scheduler. For export tests that need finished results.
pub(crate) async fn seed_completed(queue: &RenderQueue, new: NewTask, url: &str) -> Task {
    let mut store = queue.store.lock().await;
    let task = store.insert(new);
    store
        .transition(&task.id, Transition::Processing)
        .unwrap();
    store
        .transition(&task.id, Transition::Completed(url.to_string()))
        .unwrap()
}

pub(crate) fn new_task(prompt: &str) -> NewTask {
    NewTask {
        prompt: prompt.to_string(),
        reference_images: vec![],
        original_filename: None,
        source: TaskSource::Single,
    }
}

/// Poll `predicate` every 10ms until it holds, panicking after `timeout`
pub(crate) async fn wait_until<F, Fut>(what: &str, timeout: Duration, predicate: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate().await {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Client that succeeds immediately with a url derived from the task id
pub(crate) struct ImmediateClient;

#[async_trait]
impl GenerationClient for ImmediateClient {
    async fn generate(
        &self,
        task: &Task,
        _config: &GenerationConfig,
    ) -> Result<String, GenerateError> {
        Ok(format!("https://results.test/{}.png", task.id))
    }
}

/// Client that fails every call with a service error
pub(crate) struct FailingClient {
    pub(crate) message: String,
}

#[async_trait]
impl GenerationClient for FailingClient {
    async fn generate(
        &self,
        _task: &Task,
        _config: &GenerationConfig,
    ) -> Result<String, GenerateError> {
        Err(GenerateError::Service {
            status: 500,
            message: self.message.clone(),
        })
    }
}

/// Client whose calls block until released, tracking concurrency as it goes.
///
/// Each `generate` call increments the active counter, waits for one release
/// permit, then completes. `max_active` records the highest concurrency ever
/// observed, which is how cap tests assert the ceiling was respected.
#[derive(Clone)]
pub(crate) struct GatedClient {
    gate: Arc<tokio::sync::Semaphore>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl GatedClient {
    pub(crate) fn new() -> Self {
        Self {
            gate: Arc::new(tokio::sync::Semaphore::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Let `n` blocked calls finish
    pub(crate) fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// Calls currently blocked inside generate
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls ever observed
    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Total calls started
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for GatedClient {
    async fn generate(
        &self,
        task: &Task,
        _config: &GenerationConfig,
    ) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| GenerateError::Network(e.to_string()))?;
        permit.forget();

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(format!("https://results.test/{}.png", task.id))
    }
}

/// Fetcher serving canned responses; unknown urls fail like a 404
pub(crate) struct StubFetcher {
    responses: std::sync::Mutex<HashMap<String, (Vec<u8>, Option<String>)>>,
}

impl StubFetcher {
    pub(crate) fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn serve(&self, url: &str, bytes: &[u8], content_type: Option<&str>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), (bytes.to_vec(), content_type.map(str::to_string)));
    }
}

#[async_trait]
impl ResultFetcher for StubFetcher {
    async fn fetch(&self, result_url: &str) -> Result<(Vec<u8>, Option<String>), String> {
        self.responses
            .lock()
            .unwrap()
            .get(result_url)
            .cloned()
            .ok_or_else(|| "HTTP error 404".to_string())
    }
}

/// Picker returning a scripted grant decision
pub(crate) struct ScriptedPicker {
    pub(crate) decision: Result<Option<PathBuf>, String>,
}

#[async_trait]
impl DirectoryPicker for ScriptedPicker {
    async fn pick_directory(&self) -> Result<Option<PathBuf>, String> {
        self.decision.clone()
    }
}

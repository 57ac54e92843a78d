//! # renderq
//!
//! Backend library for batch image-generation applications.
//!
//! ## Design Philosophy
//!
//! renderq is designed to be:
//! - **Throughput-bounded** - A hard concurrency cap, never exceeded
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! Tasks move along `Pending → Processing → Completed | Failed`; a failed
//! task is retried by re-enqueueing it under a fresh identity. Completed
//! results are exported either as individual files into a caller-granted
//! directory or bundled into a single zip archive.
//!
//! ## Quick Start
//!
//! ```no_run
//! use renderq::{Config, GenerationConfig, RenderQueue};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         generation: GenerationConfig {
//!             api_key: "sk-...".to_string(),
//!             ..GenerationConfig::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let queue = RenderQueue::new(config);
//!     queue.start();
//!
//!     // Subscribe to events
//!     let mut events = queue.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     queue.enqueue_single("a banana in space", vec![]).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Generation service client
pub mod client;
/// Configuration types
pub mod config;
/// Core engine implementation (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Pre-queue staging area
pub mod staging;
/// Task store
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use client::{GenerationClient, HttpGenerationClient, ResultFetcher};
pub use config::{AspectRatio, Config, ExportConfig, GenerationConfig, ImageSize, QueueConfig};
pub use engine::{DirectoryPicker, ExportOutcome, ExportReport, RenderQueue};
pub use error::{Error, ExportError, GenerateError, Result};
pub use staging::{StagedFile, StagedText, StagingArea};
pub use types::{Event, ExportStrategy, QueueStats, Task, TaskId, TaskSource, TaskStatus};

/// Helper function to run the engine with graceful signal handling.
///
/// Waits for a termination signal and then calls the queue's `shutdown()`
/// method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with a `ctrl_c` fallback if
///   signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use renderq::{Config, RenderQueue, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let queue = RenderQueue::new(Config::default());
///     queue.start();
///
///     run_with_shutdown(queue).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(queue: RenderQueue) -> Result<()> {
    wait_for_signal().await;
    queue.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        _ => {
            tracing::warn!("Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}

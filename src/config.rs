//! Configuration types for renderq

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Aspect ratio requested from the rendering service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1
    #[serde(rename = "1:1")]
    Square,
    /// 3:4
    #[serde(rename = "3:4")]
    Portrait,
    /// 4:3
    #[serde(rename = "4:3")]
    Landscape,
    /// 16:9
    #[serde(rename = "16:9")]
    Wide,
    /// 9:16
    #[default]
    #[serde(rename = "9:16")]
    Mobile,
    /// 21:9
    #[serde(rename = "21:9")]
    Ultrawide,
}

impl AspectRatio {
    /// Wire representation (e.g. "9:16")
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Wide => "16:9",
            AspectRatio::Mobile => "9:16",
            AspectRatio::Ultrawide => "21:9",
        }
    }
}

/// Output resolution tier requested from the rendering service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    /// 1K
    #[serde(rename = "1K")]
    K1,
    /// 2K
    #[default]
    #[serde(rename = "2K")]
    K2,
    /// 4K
    #[serde(rename = "4K")]
    K4,
}

impl ImageSize {
    /// Wire representation (e.g. "2K")
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::K1 => "1K",
            ImageSize::K2 => "2K",
            ImageSize::K4 => "4K",
        }
    }
}

/// Rendering service settings applied to every dispatched task
///
/// This config is mutable at runtime, but each task receives an immutable
/// snapshot at dispatch time — a config change never retroactively affects a
/// task whose generation call is already in flight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// API credential sent as a bearer token
    #[serde(default)]
    pub api_key: String,

    /// Rendering service base URL (default: "https://api.bltcy.ai")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier (default: "nano-banana-2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Requested aspect ratio (default: 9:16)
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    /// Requested resolution tier (default: 2K)
    #[serde(default)]
    pub image_size: ImageSize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            aspect_ratio: AspectRatio::default(),
            image_size: ImageSize::default(),
        }
    }
}

/// Scheduler behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of tasks in `Processing` simultaneously (default: 30)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,

    /// Scheduler tick interval in milliseconds (default: 500)
    ///
    /// The scheduler also wakes on every store mutation, so the tick is a
    /// liveness fallback rather than the admission latency.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl QueueConfig {
    /// Tick interval as a [`Duration`]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Export behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Where archive exports are written (default: "./exports")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Fixed top-level folder name inside the archive
    /// (default: "rendered_images")
    #[serde(default = "default_archive_folder_name")]
    pub archive_folder_name: String,

    /// Suffix appended to exported filenames as `{base}_{suffix}.{ext}`
    /// (default: "render")
    #[serde(default = "default_filename_suffix")]
    pub filename_suffix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            archive_folder_name: default_archive_folder_name(),
            filename_suffix: default_filename_suffix(),
        }
    }
}

/// Main configuration for [`RenderQueue`](crate::RenderQueue)
///
/// Fields are organized into logical sub-configs:
/// - [`generation`](GenerationConfig) — service endpoint, model, output shape
/// - [`queue`](QueueConfig) — concurrency cap and tick interval
/// - [`export`](ExportConfig) — archive location and file naming
///
/// The queue and export sub-configs are flattened for a flat
/// JSON/TOML format; the generation sub-config stays nested because it is
/// independently replaceable at runtime.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Rendering service settings (runtime-replaceable)
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Scheduler settings
    #[serde(flatten)]
    pub queue: QueueConfig,

    /// Export settings
    #[serde(flatten)]
    pub export: ExportConfig,
}

fn default_base_url() -> String {
    "https://api.bltcy.ai".to_string()
}

fn default_model() -> String {
    "nano-banana-2".to_string()
}

fn default_max_concurrent() -> usize {
    30
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./exports")
}

fn default_archive_folder_name() -> String {
    "rendered_images".to_string()
}

fn default_filename_suffix() -> String {
    "render".to_string()
}

//! Bulk export orchestration.
//!
//! Exports every completed task's result through one of two mutually
//! exclusive strategies: individual files into a caller-granted directory,
//! or a single zip archive when no directory grant is available. Strategy
//! selection happens once per run; the two are never mixed.

use super::RenderQueue;
use crate::error::{Error, ExportError, Result};
use crate::types::{Event, ExportStrategy, Task};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};
use zip::write::FileOptions;

/// Grants a destination directory for the directory export strategy.
///
/// Mirrors an interactive grant flow: `Ok(Some(dir))` is a grant,
/// `Ok(None)` means the user cancelled the whole export, and `Err` is a
/// grant failure (the export falls back to the archive strategy).
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// Ask for a destination directory
    async fn pick_directory(&self) -> std::result::Result<Option<PathBuf>, String>;
}

/// Final report of a finished export run
#[derive(Clone, Debug)]
pub struct ExportReport {
    /// Number of results persisted
    pub written: usize,
    /// Number of results skipped because they could not be fetched or written
    pub skipped: usize,
    /// Strategy that produced the output
    pub strategy: ExportStrategy,
    /// Directory the files went into, or the archive path
    pub output: PathBuf,
}

/// Outcome of an export run
#[derive(Clone, Debug)]
pub enum ExportOutcome {
    /// The run finished; see the report for counts and destination
    Completed(ExportReport),
    /// The user cancelled at the directory grant, before any fetch or write
    Cancelled,
}

/// Clears the busy flag when an export run ends, however it ends
struct ExportGuard<'a>(&'a AtomicBool);

impl<'a> ExportGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then_some(Self(flag))
    }
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One fetched result ready to be persisted
struct FetchedItem {
    filename: String,
    bytes: Vec<u8>,
}

impl RenderQueue {
    /// Export every completed result.
    ///
    /// At most one export runs at a time; a concurrent call fails fast with
    /// [`Error::ExportInProgress`]. With no completed tasks the run fails
    /// with [`ExportError::NothingToExport`].
    ///
    /// When a `picker` is given its grant decides the strategy: a granted
    /// directory gets one file per task (directory strategy), a cancel
    /// returns [`ExportOutcome::Cancelled`] before anything is fetched, and
    /// a grant failure falls back to the archive strategy. Without a picker
    /// the archive strategy is used directly.
    ///
    /// Per-item fetch failures are skipped (logged and surfaced as
    /// `ExportItemSkipped` events) and never abort the run, except that an
    /// archive with zero fetchable results fails with
    /// [`ExportError::NothingFetched`].
    pub async fn export_all(&self, picker: Option<&dyn DirectoryPicker>) -> Result<ExportOutcome> {
        let _guard =
            ExportGuard::acquire(&self.export_busy).ok_or(Error::ExportInProgress)?;

        let tasks = {
            let store = self.store.lock().await;
            store.completed_with_results()
        };
        if tasks.is_empty() {
            return Err(ExportError::NothingToExport.into());
        }

        // Strategy selection precedes any fetch, so a cancel never leaves
        // partial output behind
        let directory = match picker {
            Some(picker) => match picker.pick_directory().await {
                Ok(Some(dir)) => Some(dir),
                Ok(None) => {
                    info!("Export cancelled at directory grant");
                    self.emit_event(Event::ExportCancelled);
                    return Ok(ExportOutcome::Cancelled);
                }
                Err(reason) => {
                    warn!(reason = %reason, "Directory grant failed, falling back to archive");
                    None
                }
            },
            None => None,
        };

        info!(total = tasks.len(), "Export started");
        self.emit_event(Event::ExportStarted { total: tasks.len() });

        let report = match directory {
            Some(dir) => self.export_to_directory(&tasks, dir).await?,
            None => self.export_to_archive(&tasks).await?,
        };

        info!(
            written = report.written,
            skipped = report.skipped,
            strategy = %report.strategy,
            output = %report.output.display(),
            "Export finished"
        );
        self.emit_event(Event::ExportFinished {
            written: report.written,
            strategy: report.strategy,
        });
        Ok(ExportOutcome::Completed(report))
    }

    /// Directory strategy: one file per task into the granted directory
    async fn export_to_directory(&self, tasks: &[Task], dir: PathBuf) -> Result<ExportReport> {
        let (items, mut skipped) = self.fetch_results(tasks).await;

        let mut written = 0;
        for item in items {
            let path = dir.join(&item.filename);
            match tokio::fs::write(&path, &item.bytes).await {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Failed to write exported file");
                    skipped += 1;
                }
            }
        }

        Ok(ExportReport {
            written,
            skipped,
            strategy: ExportStrategy::Directory,
            output: dir,
        })
    }

    /// Archive strategy: all fetchable results in one zip under a fixed
    /// top-level folder
    async fn export_to_archive(&self, tasks: &[Task]) -> Result<ExportReport> {
        let (items, skipped) = self.fetch_results(tasks).await;
        if items.is_empty() {
            return Err(ExportError::NothingFetched.into());
        }

        let written = items.len();
        let bytes = build_archive(&items, &self.export_config.archive_folder_name)?;

        let dir = self.export_config.archive_dir.clone();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExportError::Write {
                path: dir.clone(),
                reason: e.to_string(),
            })?;

        let path = dir.join(format!("batch_{}.zip", chrono::Utc::now().timestamp()));
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ExportError::Write {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        Ok(ExportReport {
            written,
            skipped,
            strategy: ExportStrategy::Archive,
            output: path,
        })
    }

    /// Fetch every result, skipping failures. Returns the fetched items in
    /// queue order plus the skip count.
    async fn fetch_results(&self, tasks: &[Task]) -> (Vec<FetchedItem>, usize) {
        let mut items = Vec::with_capacity(tasks.len());
        let mut skipped = 0;

        for task in tasks {
            // completed_with_results guarantees the url is present
            let Some(url) = task.result_url.as_deref() else {
                continue;
            };
            match self.fetcher.fetch(url).await {
                Ok((bytes, content_type)) => items.push(FetchedItem {
                    filename: export_filename(
                        task,
                        content_type.as_deref(),
                        &self.export_config.filename_suffix,
                    ),
                    bytes,
                }),
                Err(reason) => {
                    warn!(task_id = %task.id, reason = %reason, "Skipping unfetchable result");
                    self.emit_event(Event::ExportItemSkipped {
                        id: task.id.clone(),
                        error: reason,
                    });
                    skipped += 1;
                }
            }
        }

        (items, skipped)
    }
}

/// Build the zip in memory with every entry under `folder_name/`
fn build_archive(items: &[FetchedItem], folder_name: &str) -> Result<Vec<u8>> {
    let archive_err = |e: &dyn std::fmt::Display| ExportError::Archive(e.to_string());

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = FileOptions::default();

    for item in items {
        writer
            .start_file(format!("{folder_name}/{}", item.filename), options)
            .map_err(|e| archive_err(&e))?;
        writer.write_all(&item.bytes).map_err(|e| archive_err(&e))?;
    }

    let cursor = writer.finish().map_err(|e| archive_err(&e))?;
    Ok(cursor.into_inner())
}

/// `{base}_{suffix}.{ext}` — base is the original filename's stem when the
/// task has one, otherwise the task id; extension follows the fetched
/// content type (jpg for JPEG, png for everything else)
fn export_filename(task: &Task, content_type: Option<&str>, suffix: &str) -> String {
    let base = match &task.original_filename {
        Some(name) => Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(task.id.as_str())
            .to_string(),
        None => task.id.as_str().to_string(),
    };
    let ext = match content_type {
        Some(ct) if ct.contains("image/jpeg") => "jpg",
        _ => "png",
    };
    format!("{base}_{suffix}.{ext}")
}

use crate::engine::test_helpers::{new_task, seed_completed, ImmediateClient, ScriptedPicker, StubFetcher};
use crate::engine::{ExportOutcome, RenderQueue};
use crate::error::{Error, ExportError};
use crate::store::NewTask;
use crate::types::{Event, ExportStrategy, TaskSource};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn export_queue(fetcher: Arc<StubFetcher>, archive_dir: &Path) -> RenderQueue {
    let mut config = crate::engine::test_helpers::test_config(2);
    config.export.archive_dir = archive_dir.to_path_buf();
    RenderQueue::with_client(config, Arc::new(ImmediateClient), fetcher)
}

fn image_task(prompt: &str, filename: &str) -> NewTask {
    NewTask {
        prompt: prompt.to_string(),
        reference_images: vec![],
        original_filename: Some(filename.to_string()),
        source: TaskSource::ImageBatch,
    }
}

// --- preconditions ---

#[tokio::test]
async fn export_with_no_completed_tasks_fails() {
    let temp = tempdir().unwrap();
    let queue = export_queue(Arc::new(StubFetcher::new()), temp.path());

    let result = queue.export_all(None).await;
    assert!(
        matches!(result, Err(Error::Export(ExportError::NothingToExport))),
        "got: {result:?}"
    );
}

#[tokio::test]
async fn concurrent_export_is_rejected() {
    let temp = tempdir().unwrap();
    let queue = export_queue(Arc::new(StubFetcher::new()), temp.path());
    seed_completed(&queue, new_task("p"), "https://r/1").await;

    queue
        .export_busy
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let result = queue.export_all(None).await;
    assert!(matches!(result, Err(Error::ExportInProgress)), "got: {result:?}");
}

#[tokio::test]
async fn busy_flag_is_released_after_a_run() {
    let temp = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"bytes", Some("image/png"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, new_task("p"), "https://r/1").await;

    queue.export_all(None).await.unwrap();
    // The flag must be clear again, so a second run succeeds
    queue.export_all(None).await.unwrap();
}

// --- directory strategy ---

#[tokio::test]
async fn granted_directory_gets_one_file_per_task() {
    let temp = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"first", Some("image/png"));
    fetcher.serve("https://r/2", b"second", Some("image/jpeg"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, image_task("a", "alpha.png"), "https://r/1").await;
    seed_completed(&queue, image_task("b", "beta.png"), "https://r/2").await;

    let picker = ScriptedPicker {
        decision: Ok(Some(dest.path().to_path_buf())),
    };
    let outcome = queue.export_all(Some(&picker)).await.unwrap();

    let ExportOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.written, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.strategy, ExportStrategy::Directory);
    assert_eq!(report.output, dest.path());

    assert_eq!(
        std::fs::read(dest.path().join("alpha_render.png")).unwrap(),
        b"first"
    );
    // JPEG content type changes the extension
    assert_eq!(
        std::fs::read(dest.path().join("beta_render.jpg")).unwrap(),
        b"second"
    );
}

#[tokio::test]
async fn unfetchable_results_are_skipped_not_fatal() {
    let temp = tempdir().unwrap();
    let dest = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/good", b"bytes", Some("image/png"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, image_task("a", "good.png"), "https://r/good").await;
    let bad = seed_completed(&queue, image_task("b", "bad.png"), "https://r/bad").await;

    let mut events = queue.subscribe();
    let picker = ScriptedPicker {
        decision: Ok(Some(dest.path().to_path_buf())),
    };
    let outcome = queue.export_all(Some(&picker)).await.unwrap();

    let ExportOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 1);
    assert!(dest.path().join("good_render.png").exists());
    assert!(!dest.path().join("bad_render.png").exists());

    // The skip surfaces as an event naming the task
    let mut saw_skip = false;
    while let Ok(event) = events.try_recv() {
        if let Event::ExportItemSkipped { id, .. } = event {
            assert_eq!(id, bad.id);
            saw_skip = true;
        }
    }
    assert!(saw_skip, "skipped item must emit ExportItemSkipped");
}

// --- cancellation ---

#[tokio::test]
async fn cancelled_grant_writes_nothing() {
    let temp = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"bytes", Some("image/png"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, new_task("p"), "https://r/1").await;

    let mut events = queue.subscribe();
    let picker = ScriptedPicker { decision: Ok(None) };
    let outcome = queue.export_all(Some(&picker)).await.unwrap();

    assert!(matches!(outcome, ExportOutcome::Cancelled));
    assert!(
        std::fs::read_dir(temp.path()).unwrap().next().is_none(),
        "a cancel precedes every fetch and write"
    );
    assert!(matches!(events.recv().await.unwrap(), Event::ExportCancelled));
}

// --- archive strategy ---

#[tokio::test]
async fn grant_failure_falls_back_to_archive() {
    let temp = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"bytes", Some("image/png"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, new_task("p"), "https://r/1").await;

    let picker = ScriptedPicker {
        decision: Err("permission denied".to_string()),
    };
    let outcome = queue.export_all(Some(&picker)).await.unwrap();

    let ExportOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.strategy, ExportStrategy::Archive);
    assert!(report.output.starts_with(temp.path()));
    assert!(report.output.extension().is_some_and(|e| e == "zip"));
}

#[tokio::test]
async fn archive_contains_all_fetchable_results() {
    let temp = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"first", Some("image/png"));
    fetcher.serve("https://r/2", b"second", Some("image/jpeg"));
    let queue = export_queue(fetcher, temp.path());
    let one = seed_completed(&queue, new_task("a"), "https://r/1").await;
    seed_completed(&queue, image_task("b", "photo.jpg"), "https://r/2").await;
    // A third task whose result cannot be fetched
    seed_completed(&queue, new_task("c"), "https://r/gone").await;

    let outcome = queue.export_all(None).await.unwrap();
    let ExportOutcome::Completed(report) = outcome else {
        panic!("expected a completed run");
    };
    assert_eq!(report.written, 2, "exactly the fetchable results are written");
    assert_eq!(report.skipped, 1);

    let file = std::fs::File::open(&report.output).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    assert_eq!(archive.len(), 2);
    assert!(
        archive
            .by_name(&format!("rendered_images/{}_render.png", one.id))
            .is_ok(),
        "id-named entry under the fixed folder"
    );
    assert!(archive.by_name("rendered_images/photo_render.jpg").is_ok());
}

#[tokio::test]
async fn archive_with_zero_fetchable_results_fails() {
    let temp = tempdir().unwrap();
    let queue = export_queue(Arc::new(StubFetcher::new()), temp.path());
    seed_completed(&queue, new_task("p"), "https://r/unreachable").await;

    let result = queue.export_all(None).await;
    assert!(
        matches!(result, Err(Error::Export(ExportError::NothingFetched))),
        "got: {result:?}"
    );
    assert!(
        std::fs::read_dir(temp.path()).unwrap().next().is_none(),
        "no empty archive may be written"
    );
}

// --- events ---

#[tokio::test]
async fn export_emits_started_and_finished_events() {
    let temp = tempdir().unwrap();
    let fetcher = Arc::new(StubFetcher::new());
    fetcher.serve("https://r/1", b"bytes", Some("image/png"));
    let queue = export_queue(fetcher, temp.path());
    seed_completed(&queue, new_task("p"), "https://r/1").await;

    let mut events = queue.subscribe();
    queue.export_all(None).await.unwrap();

    match events.recv().await.unwrap() {
        Event::ExportStarted { total } => assert_eq!(total, 1),
        other => panic!("expected ExportStarted, got: {other:?}"),
    }
    match events.recv().await.unwrap() {
        Event::ExportFinished { written, strategy } => {
            assert_eq!(written, 1);
            assert_eq!(strategy, ExportStrategy::Archive);
        }
        other => panic!("expected ExportFinished, got: {other:?}"),
    }
}

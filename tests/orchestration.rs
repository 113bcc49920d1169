//! Integration tests for background parsing through the orchestrator.
//!
//! Every test uses its own `SourceLocks` table so parallel tests never
//! contend for the process-wide locks.

use std::sync::Arc;
use std::time::Duration;

use newsblob::feed::{ParseError, ParseEvent, ParseOptions, ParseOrchestrator, ParseOutcome, SequenceIds};
use newsblob::source::{Source, SourceLocks};

const FEED: &str = r#"{
  "news": [
    {"externalId": "a", "title": "Alpha", "type": "story", "date": "2024-03-01T10:00:00.000+01:00"},
    {"externalId": "b", "title": "Beta", "type": "story", "date": "2024-03-01T11:00:00.000+01:00"}
  ],
  "regional": []
}"#;

fn orchestrator(retry: Duration) -> ParseOrchestrator {
    let options = ParseOptions::default().with_ids(Arc::new(SequenceIds::default()));
    ParseOrchestrator::new(options)
        .with_locks(Arc::new(SourceLocks::new(retry)))
        .with_progress_interval(Duration::from_millis(5))
}

fn write_cache(dir_name: &str, source: Source) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(dir_name);
    std::fs::create_dir_all(&dir).unwrap();
    let path = source.cache_path(&dir);
    std::fs::write(&path, FEED).unwrap();
    path
}

#[tokio::test]
async fn test_parse_cache_file() {
    let path = write_cache("newsblob_it_orch_file", Source::Inland);
    let orch = orchestrator(Duration::from_millis(10));

    let mut task = orch.parse_file(Some(Source::Inland), &path);
    let mut progress = Vec::new();
    let outcome = loop {
        match task.next_event().await.unwrap() {
            ParseEvent::Progress(fraction) => progress.push(fraction),
            ParseEvent::Finished(outcome) => break outcome,
        }
    };
    // nothing after the terminal event
    assert!(task.next_event().await.is_none());

    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));

    let blob = outcome.blob().unwrap();
    assert_eq!(blob.source(), Some(Source::Inland));
    assert_eq!(blob.len(), 2);
    assert_eq!(blob.all_news()[0].external_id, "b");

    // the lock is free again
    assert!(!orch.locks().is_locked(Source::Inland));

    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn test_busy_source_reports_busy() {
    let orch = orchestrator(Duration::from_millis(20));
    let holder = orch.locks().lock(Source::Sport).unwrap();

    let outcome = orch
        .parse_reader(Some(Source::Sport), std::io::Cursor::new(FEED.as_bytes()), FEED.len() as u64)
        .wait()
        .await;
    assert!(matches!(outcome, ParseOutcome::Busy));

    assert!(orch.locks().unlock(Source::Sport, holder.token));
    let outcome = orch
        .parse_reader(Some(Source::Sport), std::io::Cursor::new(FEED.as_bytes()), FEED.len() as u64)
        .wait()
        .await;
    assert!(matches!(outcome, ParseOutcome::Parsed(_)));
}

#[tokio::test]
async fn test_sources_lock_independently() {
    let orch = orchestrator(Duration::from_millis(10));
    let _holder = orch.locks().lock(Source::Home).unwrap();

    let outcome = orch
        .parse_reader(Some(Source::Regional), std::io::Cursor::new(FEED.as_bytes()), FEED.len() as u64)
        .wait()
        .await;
    assert!(matches!(outcome, ParseOutcome::Parsed(_)));
    assert!(orch.locks().is_locked(Source::Home));
}

#[tokio::test]
async fn test_unlocked_parse_without_source() {
    let orch = orchestrator(Duration::from_millis(10));
    let outcome = orch
        .parse_reader(None, std::io::Cursor::new(FEED.as_bytes()), FEED.len() as u64)
        .wait()
        .await;
    let blob = outcome.blob().unwrap();
    assert_eq!(blob.source(), None);
    assert!(Source::ALL.iter().all(|s| !orch.locks().is_locked(*s)));
}

#[tokio::test]
async fn test_failed_parse_releases_lock() {
    let orch = orchestrator(Duration::from_millis(10));
    let broken = "{\"news\": [{\"externalId\": \"a\",]}";

    let mut progress = Vec::new();
    let outcome = orch
        .parse_reader(Some(Source::Wissen), std::io::Cursor::new(broken.as_bytes()), broken.len() as u64)
        .wait_with_progress(|fraction| progress.push(fraction))
        .await;
    match outcome {
        ParseOutcome::Failed(ParseError::Malformed { line, .. }) => assert_eq!(line, 1),
        other => panic!("Expected Malformed, got {:?}", other),
    }
    // a failed parse still completes its progress
    assert_eq!(progress.last().copied(), Some(1.0));
    assert!(!orch.locks().is_locked(Source::Wissen));
}

#[tokio::test]
async fn test_missing_cache_file() {
    let orch = orchestrator(Duration::from_millis(10));
    let mut task = orch.parse_file(Some(Source::Video), "/nonexistent/newsblob/VIDEO.source");
    let mut events = Vec::new();
    while let Some(event) = task.next_event().await {
        events.push(event);
    }
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(matches!(events[0], ParseEvent::Progress(fraction) if fraction == 1.0));
    assert!(matches!(events[1], ParseEvent::Finished(ParseOutcome::Failed(ParseError::Stream(_)))));
    assert!(!orch.locks().is_locked(Source::Video));
}

#[tokio::test]
async fn test_cancel_during_lock_retry() {
    let orch = orchestrator(Duration::from_secs(10));
    let holder = orch.locks().lock(Source::Ausland).unwrap();

    let task = orch.parse_reader(Some(Source::Ausland), std::io::Cursor::new(FEED.as_bytes()), FEED.len() as u64);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let handle = task.cancel_handle();
    handle.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(2), task.wait())
        .await
        .expect("cancel ends the retry wait");
    assert!(matches!(outcome, ParseOutcome::Cancelled));
    assert!(orch.locks().unlock(Source::Ausland, holder.token));
}

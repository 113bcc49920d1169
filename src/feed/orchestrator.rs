//! Background parsing with progress reporting.
//!
//! A parse runs as three cooperating pieces:
//!
//! - a driver task that takes the source lock, opens the input and waits for
//!   the parse or a cancellation, whichever comes first
//! - the parse itself on the blocking pool, reading through a [`CountingReader`]
//! - a monitor task that samples the byte counter and reports progress
//!
//! Every task ends with exactly one [`ParseEvent::Finished`]. Once the lock
//! is taken, a final `Progress(1.0)` precedes it whatever the outcome.
//!
//! The source lock is owned by the blocking parse, so it is released when
//! reading stops, even if the parse panics or the caller has stopped listening.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::blob::Blob;
use super::error::ParseError;
use super::options::ParseOptions;
use crate::source::{Source, SourceLocks};

/// Default sampling interval of the progress monitor.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the event channel. At most 101 progress steps plus the
/// final pair are ever sent, so the senders never wait.
const EVENT_BUFFER: usize = 128;

// ============================================================================
// Events
// ============================================================================

/// How a parse ended.
#[derive(Debug)]
pub enum ParseOutcome {
    Parsed(Blob),
    /// The source was locked by another parse, also after one retry.
    Busy,
    Cancelled,
    Failed(ParseError),
}

impl ParseOutcome {
    pub fn blob(self) -> Option<Blob> {
        match self {
            ParseOutcome::Parsed(blob) => Some(blob),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ParseEvent {
    /// Fraction of input bytes read, in `0.0..=1.0`. Only sent when it grew.
    Progress(f32),
    /// Terminal event; nothing follows it.
    Finished(ParseOutcome),
}

// ============================================================================
// Counting reader
// ============================================================================

/// Counts bytes read through it into a shared counter.
#[derive(Debug)]
pub struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared handle to the byte count.
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.count)
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelState {
    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cancels a running parse from anywhere.
///
/// Cancellation is advisory: reading is not interrupted, but the task
/// reports [`ParseOutcome::Cancelled`] and the parsed blob is discarded.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

// ============================================================================
// Task handle
// ============================================================================

/// Handle to one running parse.
#[derive(Debug)]
pub struct ParseTask {
    events: mpsc::Receiver<ParseEvent>,
    cancel: Arc<CancelState>,
    driver: JoinHandle<()>,
}

impl ParseTask {
    /// Next event, or `None` once the terminal event has been taken.
    pub async fn next_event(&mut self) -> Option<ParseEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.cancel),
        }
    }

    /// Waits for the outcome, discarding progress.
    pub async fn wait(self) -> ParseOutcome {
        self.wait_with_progress(|_| {}).await
    }

    /// Waits for the outcome, passing each progress fraction to `on_progress`.
    pub async fn wait_with_progress(mut self, mut on_progress: impl FnMut(f32)) -> ParseOutcome {
        while let Some(event) = self.events.recv().await {
            match event {
                ParseEvent::Progress(fraction) => on_progress(fraction),
                ParseEvent::Finished(outcome) => return outcome,
            }
        }
        // the driver only drops its sender without sending if it died
        let reason = match (&mut self.driver).await {
            Err(e) => e.to_string(),
            Ok(()) => "parse task ended without an outcome".to_string(),
        };
        ParseOutcome::Failed(ParseError::Aborted(reason))
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

enum Input {
    File(PathBuf),
    Reader { reader: Box<dyn Read + Send>, len: u64 },
}

/// Starts parses in the background. Must be used inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ParseOrchestrator {
    options: Arc<ParseOptions>,
    locks: Arc<SourceLocks>,
    progress_interval: Duration,
}

impl ParseOrchestrator {
    /// An orchestrator using the process-wide source locks.
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options: Arc::new(options),
            locks: SourceLocks::shared(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_locks(mut self, locks: Arc<SourceLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn locks(&self) -> &Arc<SourceLocks> {
        &self.locks
    }

    /// Parses the file at `path`, holding `source`'s lock if one is given.
    pub fn parse_file(&self, source: Option<Source>, path: impl Into<PathBuf>) -> ParseTask {
        self.start(source, Input::File(path.into()))
    }

    /// Parses an arbitrary reader of `len` bytes (used for progress only).
    pub fn parse_reader<R>(&self, source: Option<Source>, reader: R, len: u64) -> ParseTask
    where
        R: Read + Send + 'static,
    {
        self.start(
            source,
            Input::Reader {
                reader: Box::new(reader),
                len,
            },
        )
    }

    fn start(&self, source: Option<Source>, input: Input) -> ParseTask {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let cancel = Arc::new(CancelState::default());

        let driver = tokio::spawn(drive(
            Arc::clone(&self.options),
            Arc::clone(&self.locks),
            self.progress_interval,
            source,
            input,
            Arc::clone(&cancel),
            tx,
        ));

        ParseTask {
            events: rx,
            cancel,
            driver,
        }
    }
}

async fn drive(
    options: Arc<ParseOptions>,
    locks: Arc<SourceLocks>,
    interval: Duration,
    source: Option<Source>,
    input: Input,
    cancel: Arc<CancelState>,
    tx: mpsc::Sender<ParseEvent>,
) {
    let outcome = run(options, locks, interval, source, input, &cancel, &tx).await;
    match &outcome {
        ParseOutcome::Parsed(blob) => {
            tracing::info!(source = ?source, articles = blob.len(), "Parse finished")
        }
        ParseOutcome::Busy => tracing::info!(source = ?source, "Parse skipped, source busy"),
        ParseOutcome::Cancelled => tracing::info!(source = ?source, "Parse cancelled"),
        ParseOutcome::Failed(e) => tracing::warn!(source = ?source, error = %e, "Parse failed"),
    }
    if tx.send(ParseEvent::Finished(outcome)).await.is_err() {
        tracing::debug!(source = ?source, "Parse outcome dropped, receiver gone");
    }
}

async fn run(
    options: Arc<ParseOptions>,
    locks: Arc<SourceLocks>,
    interval: Duration,
    source: Option<Source>,
    input: Input,
    cancel: &CancelState,
    tx: &mpsc::Sender<ParseEvent>,
) -> ParseOutcome {
    let guard = match source {
        Some(source) => {
            // a cancel during the retry delay ends the wait
            let acquired = tokio::select! {
                biased;
                _ = cancel.notify.notified() => None,
                guard = locks.acquire(source) => guard,
            };
            match acquired {
                Some(guard) => Some(guard),
                None if cancel.is_cancelled() => return ParseOutcome::Cancelled,
                None => return ParseOutcome::Busy,
            }
        }
        None => None,
    };
    if cancel.is_cancelled() {
        drop(guard);
        send_final_progress(tx).await;
        return ParseOutcome::Cancelled;
    }

    let (reader, len): (Box<dyn Read + Send>, u64) = match input {
        Input::Reader { reader, len } => (reader, len),
        Input::File(path) => {
            let opened = tokio::task::spawn_blocking(move || -> io::Result<(File, u64)> {
                let file = File::open(&path)?;
                let len = file.metadata()?.len();
                Ok((file, len))
            })
            .await;
            let failure = match opened {
                Ok(Ok((file, len))) => Ok((Box::new(file) as Box<dyn Read + Send>, len)),
                Ok(Err(e)) => Err(ParseError::Stream(e)),
                Err(e) => Err(ParseError::Aborted(e.to_string())),
            };
            match failure {
                Ok(opened) => opened,
                Err(e) => {
                    drop(guard);
                    send_final_progress(tx).await;
                    return ParseOutcome::Failed(e);
                }
            }
        }
    };
    tracing::debug!(source = ?source, bytes = len, "Starting parse");

    let reader = CountingReader::new(reader);
    let counter = reader.counter();
    let stop = Arc::new(Notify::new());
    let monitor = tokio::spawn(monitor(counter, len, interval, Arc::clone(&stop), tx.clone()));

    let parse = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        Blob::parse(BufReader::new(reader), &options).map(|blob| blob.with_source(source))
    });

    let outcome = tokio::select! {
        joined = parse => match joined {
            Ok(Ok(blob)) => ParseOutcome::Parsed(blob),
            Ok(Err(e)) => ParseOutcome::Failed(e),
            Err(e) => ParseOutcome::Failed(ParseError::Aborted(e.to_string())),
        },
        _ = cancel.notify.notified() => ParseOutcome::Cancelled,
    };

    stop.notify_one();
    if let Err(e) = monitor.await {
        tracing::warn!(error = %e, "Progress monitor failed");
    }

    if cancel.is_cancelled() {
        ParseOutcome::Cancelled
    } else {
        outcome
    }
}

/// Samples `counter` every `interval` until stopped, then reports completion.
async fn monitor(
    counter: Arc<AtomicU64>,
    len: u64,
    interval: Duration,
    stop: Arc<Notify>,
    tx: mpsc::Sender<ParseEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_percent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = ticker.tick() => {}
        }
        if len == 0 {
            continue;
        }
        let read = counter.load(Ordering::Relaxed).min(len);
        let percent = read * 100 / len;
        if percent > last_percent {
            last_percent = percent;
            let fraction = read as f32 / len as f32;
            if tx.send(ParseEvent::Progress(fraction)).await.is_err() {
                return;
            }
        }
    }

    send_final_progress(&tx).await;
}

async fn send_final_progress(tx: &mpsc::Sender<ParseEvent>) {
    if tx.send(ParseEvent::Progress(1.0)).await.is_err() {
        tracing::trace!("Final progress dropped, receiver gone");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SequenceIds;
    use std::time::Instant;

    const DOC: &str = r#"{"news": [{"externalId": "a", "title": "A", "type": "story"}], "regional": []}"#;

    fn orchestrator(locks: Arc<SourceLocks>) -> ParseOrchestrator {
        ParseOrchestrator::new(ParseOptions::default().with_ids(Arc::new(SequenceIds::default())))
            .with_locks(locks)
            .with_progress_interval(Duration::from_millis(5))
    }

    fn private_locks() -> Arc<SourceLocks> {
        Arc::new(SourceLocks::new(Duration::from_millis(250)))
    }

    /// Blocks until the gate is opened, then reads the document.
    struct GatedReader {
        gate: std::sync::mpsc::Receiver<()>,
        inner: io::Cursor<&'static [u8]>,
        opened: bool,
    }

    impl Read for GatedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.opened {
                let _ = self.gate.recv();
                self.opened = true;
            }
            self.inner.read(buf)
        }
    }

    fn gated() -> (std::sync::mpsc::Sender<()>, GatedReader) {
        let (tx, rx) = std::sync::mpsc::channel();
        let reader = GatedReader {
            gate: rx,
            inner: io::Cursor::new(DOC.as_bytes()),
            opened: false,
        };
        (tx, reader)
    }

    #[test]
    fn test_counting_reader() {
        let mut reader = CountingReader::new(io::Cursor::new(vec![0u8; 1000]));
        let counter = reader.counter();
        let mut buf = [0u8; 300];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 300);
        io::copy(&mut reader, &mut io::sink()).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
    }

    #[tokio::test]
    async fn test_parse_reader_delivers_blob_after_final_progress() {
        let task = orchestrator(private_locks()).parse_reader(Some(Source::Home), DOC.as_bytes(), DOC.len() as u64);
        let mut progress = Vec::new();
        let outcome = task.wait_with_progress(|p| progress.push(p)).await;

        let blob = outcome.blob().expect("parsed blob");
        assert_eq!(blob.source(), Some(Source::Home));
        assert_eq!(blob.national_news().len(), 1);
        assert_eq!(progress.last(), Some(&1.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_exactly_one_terminal_event() {
        let mut task = orchestrator(private_locks()).parse_reader(None, DOC.as_bytes(), DOC.len() as u64);
        let mut finished = 0;
        while let Some(event) = task.next_event().await {
            if let ParseEvent::Finished(_) = event {
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
    }

    #[tokio::test]
    async fn test_malformed_input_fails_and_releases_lock() {
        let locks = private_locks();
        let doc: &'static [u8] = b"{\"news\": [{\"externalId\": }]}";
        let mut progress = Vec::new();
        let outcome = orchestrator(Arc::clone(&locks))
            .parse_reader(Some(Source::Sport), doc, doc.len() as u64)
            .wait_with_progress(|p| progress.push(p))
            .await;
        assert!(matches!(outcome, ParseOutcome::Failed(ParseError::Malformed { .. })));
        assert_eq!(progress.last(), Some(&1.0));
        assert!(!locks.is_locked(Source::Sport));
    }

    #[tokio::test]
    async fn test_missing_file_is_stream_failure() {
        let locks = private_locks();
        let mut progress = Vec::new();
        let outcome = orchestrator(Arc::clone(&locks))
            .parse_file(Some(Source::Wissen), "/nonexistent/WISSEN.source")
            .wait_with_progress(|p| progress.push(p))
            .await;
        assert!(matches!(outcome, ParseOutcome::Failed(ParseError::Stream(_))));
        assert_eq!(progress, vec![1.0]);
        assert!(!locks.is_locked(Source::Wissen));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_parse_on_locked_source_is_busy() {
        let locks = private_locks();
        let orchestrator = orchestrator(Arc::clone(&locks));

        let (gate, reader) = gated();
        let first = orchestrator.parse_reader(Some(Source::Regional), reader, DOC.len() as u64);
        while !locks.is_locked(Source::Regional) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let start = Instant::now();
        let second = orchestrator
            .parse_reader(Some(Source::Regional), DOC.as_bytes(), DOC.len() as u64)
            .wait()
            .await;
        let waited = start.elapsed();
        assert!(matches!(second, ParseOutcome::Busy));
        assert!(waited < Duration::from_millis(400), "waited {waited:?}");

        gate.send(()).unwrap();
        assert!(first.wait().await.blob().is_some());
        assert!(!locks.is_locked(Source::Regional));
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_lock() {
        let locks = Arc::new(SourceLocks::new(Duration::from_secs(5)));
        let holder = locks.lock(Source::Inland).unwrap();
        let task = orchestrator(Arc::clone(&locks)).parse_reader(Some(Source::Inland), DOC.as_bytes(), DOC.len() as u64);

        // let the driver reach the retry delay
        tokio::time::sleep(Duration::from_millis(20)).await;
        let start = Instant::now();
        task.cancel();
        let mut progress = Vec::new();
        let outcome = task.wait_with_progress(|p| progress.push(p)).await;

        assert!(matches!(outcome, ParseOutcome::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2), "waited {:?}", start.elapsed());
        assert!(progress.is_empty());
        // the other holder keeps its lock
        assert!(locks.is_locked(Source::Inland));
        assert!(locks.unlock(Source::Inland, holder.token));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_reports_cancelled_and_lock_is_released() {
        let locks = private_locks();
        let (gate, reader) = gated();
        let task = orchestrator(Arc::clone(&locks)).parse_reader(Some(Source::Video), reader, DOC.len() as u64);
        while !locks.is_locked(Source::Video) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let handle = task.cancel_handle();
        handle.cancel();
        let mut progress = Vec::new();
        let outcome = task.wait_with_progress(|p| progress.push(p)).await;
        assert!(matches!(outcome, ParseOutcome::Cancelled));
        assert_eq!(progress.last(), Some(&1.0));

        // the blocking read still holds the lock until it finishes
        gate.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while locks.is_locked(Source::Video) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!locks.is_locked(Source::Video));
    }
}

use crate::cache::{cache_key, ResultCache};
use crate::config::AppConfig;
use crate::error::Error;
use crate::filter::FilterSet;
use crate::model::{FileRecord, ScanRequest};
use crate::platform::{OwnerResolver, PlatformOwnerResolver};
use crate::progress::{EventSink, ScanEvent};
use crate::scanner::walk::DEFAULT_PROGRESS_INTERVAL;
use crate::scanner::{
    worker, DirectoryWalker, DiscoveryGuard, DiscoveryQueue, QueueSink, ScanState, ScanTotals,
    WalkSummary, WorkerContext, WorkerStats, DEFAULT_CHUNK_SIZE, DEFAULT_QUEUE_CAPACITY,
};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of the controller. Terminal phases only return to `Idle` through
/// [`ScanController::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Aborted,
}

impl ScanPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanPhase::Completed | ScanPhase::Aborted)
    }
}

/// Knobs that shape a scan's resource use without changing its result.
#[derive(Debug, Clone)]
pub struct ScanTuning {
    pub queue_capacity: usize,
    pub chunk_size: usize,
    pub poll_interval: Duration,
    pub progress_interval: usize,
}

impl Default for ScanTuning {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl From<&AppConfig> for ScanTuning {
    fn from(config: &AppConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            chunk_size: config.chunk_size,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            progress_interval: config.progress_interval,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Completed,
    /// Discovery hit the file cap; everything discovered was still processed.
    Truncated,
    Aborted,
    /// Results replayed from the result cache.
    Cached,
    /// An internal failure ended the scan early; totals are partial.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub status: ScanStatus,
    pub totals: ScanTotals,
    pub discovered: usize,
    pub processed: usize,
    pub skipped_dirs: usize,
    pub worker_stats: WorkerStats,
    pub elapsed: Duration,
}

/// Owns the scan state machine. One scan at a time per controller; independent
/// controllers never share state.
pub struct ScanController {
    phase: Arc<Mutex<ScanPhase>>,
    tuning: ScanTuning,
    resolver: Arc<dyn OwnerResolver>,
    cache: Option<Arc<dyn ResultCache>>,
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanController {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(Mutex::new(ScanPhase::Idle)),
            tuning: ScanTuning::default(),
            resolver: Arc::new(PlatformOwnerResolver),
            cache: None,
        }
    }

    pub fn with_tuning(mut self, tuning: ScanTuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn OwnerResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock()
    }

    /// `Idle → Running`. Spawns the orchestrator, which runs the walker and the worker pool.
    pub fn start(&self, request: ScanRequest) -> Result<ScanHandle, Error> {
        request.validate()?;
        let walker = DirectoryWalker::new(&request.root, request.max_files)
            .with_progress_interval(self.tuning.progress_interval)
            .with_ignore_patterns(&request.ignore_patterns)?;
        let key = cache_key(&request);

        let mut phase = self.phase.lock();
        if *phase != ScanPhase::Idle {
            return Err(Error::InvalidTransition {
                from: *phase,
                action: "start",
            });
        }

        let cached = match (&self.cache, request.bypass_cache) {
            (Some(cache), false) => cache.lookup(&key),
            _ => None,
        };

        let state = Arc::new(ScanState::new(self.tuning.poll_interval));
        let (tx, rx) = crossbeam_channel::unbounded();
        let run = ScanRun {
            request,
            walker,
            tuning: self.tuning.clone(),
            resolver: Arc::clone(&self.resolver),
            state: Arc::clone(&state),
            phase: Arc::clone(&self.phase),
            events: EventSink::new(tx),
            cache: self.cache.clone(),
            cache_key: key.clone(),
        };

        let orchestrator = thread::Builder::new()
            .name("scan-controller".to_string())
            .spawn(move || match cached {
                Some(records) => run.replay(records),
                None => run.execute(),
            })?;
        *phase = ScanPhase::Running;

        Ok(ScanHandle {
            state,
            phase: Arc::clone(&self.phase),
            events: rx,
            orchestrator: Some(orchestrator),
            cache_key: key,
        })
    }

    /// `Completed | Aborted → Idle`. A no-op when already idle.
    pub fn reset(&self) -> Result<(), Error> {
        let mut phase = self.phase.lock();
        match *phase {
            ScanPhase::Idle => Ok(()),
            current if current.is_terminal() => {
                *phase = ScanPhase::Idle;
                Ok(())
            }
            current => Err(Error::InvalidTransition {
                from: current,
                action: "reset",
            }),
        }
    }
}

/// Control surface of one running scan.
pub struct ScanHandle {
    state: Arc<ScanState>,
    phase: Arc<Mutex<ScanPhase>>,
    events: Receiver<ScanEvent>,
    orchestrator: Option<JoinHandle<ScanOutcome>>,
    cache_key: String,
}

impl ScanHandle {
    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    pub fn phase(&self) -> ScanPhase {
        *self.phase.lock()
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    /// `Running → Paused`.
    pub fn pause(&self) -> Result<(), Error> {
        let mut phase = self.phase.lock();
        match *phase {
            ScanPhase::Running => {
                self.state.pause();
                *phase = ScanPhase::Paused;
                info!("Scan paused");
                Ok(())
            }
            current => Err(Error::InvalidTransition {
                from: current,
                action: "pause",
            }),
        }
    }

    /// `Paused → Running`.
    pub fn resume(&self) -> Result<(), Error> {
        let mut phase = self.phase.lock();
        match *phase {
            ScanPhase::Paused => {
                self.state.resume();
                *phase = ScanPhase::Running;
                info!("Scan resumed");
                Ok(())
            }
            current => Err(Error::InvalidTransition {
                from: current,
                action: "resume",
            }),
        }
    }

    /// Ask the walker and workers to stop. Safe to call any number of times;
    /// the phase becomes `Aborted` once every thread has been joined.
    pub fn abort(&self) {
        self.aborter().abort();
    }

    /// A cloneable handle that can abort this scan from another thread.
    pub fn aborter(&self) -> ScanAborter {
        ScanAborter {
            state: Arc::clone(&self.state),
        }
    }

    /// Block until the scan reaches a terminal phase.
    pub fn wait(mut self) -> ScanOutcome {
        let joined = match self.orchestrator.take() {
            Some(handle) => handle.join(),
            None => Err(Box::new("scan already joined") as Box<dyn Any + Send>),
        };
        match joined {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Scan controller failed: {}", message);
                let mut phase = self.phase.lock();
                if !phase.is_terminal() {
                    *phase = ScanPhase::Completed;
                }
                ScanOutcome {
                    status: ScanStatus::Failed(message),
                    totals: self.state.totals(),
                    discovered: self.state.discovered(),
                    processed: self.state.processed(),
                    skipped_dirs: self.state.skipped_count(),
                    worker_stats: WorkerStats::default(),
                    elapsed: Duration::ZERO,
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanAborter {
    state: Arc<ScanState>,
}

impl ScanAborter {
    pub fn abort(&self) {
        if self.state.request_stop() {
            info!("Scan abort requested");
        }
    }
}

/// Everything the orchestrator thread owns for the duration of one scan.
struct ScanRun {
    request: ScanRequest,
    walker: DirectoryWalker,
    tuning: ScanTuning,
    resolver: Arc<dyn OwnerResolver>,
    state: Arc<ScanState>,
    phase: Arc<Mutex<ScanPhase>>,
    events: EventSink,
    cache: Option<Arc<dyn ResultCache>>,
    cache_key: String,
}

impl ScanRun {
    fn execute(self) -> ScanOutcome {
        let started = Instant::now();
        info!("Scanning {}", self.request.root.display());
        self.events.status("Collecting files...");

        let queue = DiscoveryQueue::new(self.tuning.queue_capacity);
        let mut failure: Option<String> = None;

        let walker_handle = {
            let state = Arc::clone(&self.state);
            let queue = queue.clone();
            let events = self.events.clone();
            let walker = self.walker.clone();
            thread::Builder::new()
                .name("scan-walker".to_string())
                .spawn(move || {
                    let _complete = DiscoveryGuard(&state);
                    let mut sink = QueueSink {
                        queue: &queue,
                        state: &state,
                        events: &events,
                    };
                    walker.walk(&state, &mut sink)
                })
        };
        let walker_handle = match walker_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                self.state.mark_discovery_complete();
                failure = Some(format!("unable to start directory walker: {}", e));
                None
            }
        };

        let results = self.cache.as_ref().map(|_| Arc::new(Mutex::new(Vec::new())));
        let context = Arc::new(WorkerContext {
            state: Arc::clone(&self.state),
            queue,
            filters: FilterSet::new(&self.request, SystemTime::now()),
            resolver: Arc::clone(&self.resolver),
            events: self.events.clone(),
            chunk_size: self.tuning.chunk_size,
            results: results.clone(),
        });
        let worker_handles = match worker::spawn_workers(context, self.request.workers) {
            Ok(handles) => handles,
            Err(e) => {
                // Nothing would drain the queue, so the walker has to be released.
                self.state.request_stop();
                failure.get_or_insert(format!("unable to start worker pool: {}", e));
                Vec::new()
            }
        };

        let summary: Option<WalkSummary> = match walker_handle.map(JoinHandle::join) {
            Some(Ok(summary)) => Some(summary),
            Some(Err(panic)) => {
                let message = format!("directory walker failed: {}", panic_message(panic.as_ref()));
                error!("{}", message);
                failure.get_or_insert(message);
                None
            }
            None => None,
        };
        if let Some(summary) = summary {
            debug!(
                "Discovery finished: {:?}, {} files published of ~{} entries",
                summary.status, summary.published, summary.estimated_total
            );
        }

        let mut worker_stats = WorkerStats::default();
        for handle in worker_handles {
            match handle.join() {
                Ok(stats) => worker_stats += stats,
                Err(panic) => {
                    let message = format!("scan worker failed: {}", panic_message(panic.as_ref()));
                    error!("{}", message);
                    failure.get_or_insert(message);
                }
            }
        }

        let status = match failure {
            Some(message) => ScanStatus::Failed(message),
            None if self.state.is_stopped() => ScanStatus::Aborted,
            None if self.state.is_truncated() => ScanStatus::Truncated,
            None => ScanStatus::Completed,
        };
        if let (Some(cache), Some(results), ScanStatus::Completed) = (&self.cache, results, &status) {
            let records = std::mem::take(&mut *results.lock());
            debug!("Caching {} results under {}", records.len(), self.cache_key);
            cache.store(&self.cache_key, records);
        }
        self.finish(status, worker_stats, started)
    }

    fn replay(self, records: Vec<FileRecord>) -> ScanOutcome {
        let started = Instant::now();
        info!(
            "Replaying {} cached results for {}",
            records.len(),
            self.request.root.display()
        );
        self.events
            .status(format!("Loaded {} results from cache", records.len()));

        for record in records {
            if self.state.is_stopped() || !self.state.wait_while_paused() {
                break;
            }
            self.state.add_discovered();
            self.state.record_match(record.size);
            self.events.emit(ScanEvent::FileDiscovered(record));
        }
        self.state.mark_discovery_complete();

        let status = if self.state.is_stopped() {
            ScanStatus::Aborted
        } else {
            ScanStatus::Cached
        };
        self.finish(status, WorkerStats::default(), started)
    }

    fn finish(self, status: ScanStatus, worker_stats: WorkerStats, started: Instant) -> ScanOutcome {
        let totals = self.state.totals();
        let outcome = ScanOutcome {
            status,
            totals,
            discovered: self.state.discovered(),
            processed: self.state.processed(),
            skipped_dirs: self.state.skipped_count(),
            worker_stats,
            elapsed: started.elapsed(),
        };

        let aborted = outcome.status == ScanStatus::Aborted;
        *self.phase.lock() = if aborted {
            ScanPhase::Aborted
        } else {
            ScanPhase::Completed
        };

        match &outcome.status {
            ScanStatus::Aborted => self.events.status("Scan aborted"),
            ScanStatus::Failed(message) => {
                self.events.status(format!("Critical error: {}", message))
            }
            _ => self.events.status("Scan complete"),
        }
        let event = if aborted {
            ScanEvent::ScanAborted {
                total_bytes: totals.total_bytes,
                file_count: totals.file_count,
            }
        } else {
            ScanEvent::ScanComplete {
                total_bytes: totals.total_bytes,
                file_count: totals.file_count,
            }
        };
        self.events.emit(event);

        info!(
            "Scan finished ({:?}) in {:.2}s: {} matching files, {} bytes, {} directories skipped",
            outcome.status,
            outcome.elapsed.as_secs_f64(),
            totals.file_count,
            totals.total_bytes,
            outcome.skipped_dirs,
        );
        outcome
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn quick_tuning() -> ScanTuning {
        ScanTuning {
            poll_interval: Duration::from_millis(10),
            ..ScanTuning::default()
        }
    }

    #[test]
    fn test_reset_requires_terminal_phase() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.txt"), b"a").unwrap();

        let controller = ScanController::new().with_tuning(quick_tuning());
        assert!(controller.reset().is_ok());

        let handle = controller.start(ScanRequest::new(tmp.path())).unwrap();
        let outcome = handle.wait();
        assert_eq!(outcome.status, ScanStatus::Completed);
        assert_eq!(controller.phase(), ScanPhase::Completed);

        let err = controller.start(ScanRequest::new(tmp.path()));
        assert!(matches!(
            err,
            Err(Error::InvalidTransition {
                from: ScanPhase::Completed,
                action: "start"
            })
        ));

        controller.reset().unwrap();
        assert_eq!(controller.phase(), ScanPhase::Idle);
    }

    #[test]
    fn test_invalid_request_leaves_controller_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let controller = ScanController::new();
        let result = controller.start(ScanRequest::new(tmp.path().join("missing")));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(controller.phase(), ScanPhase::Idle);
    }

    fn record(name: &str) -> FileRecord {
        FileRecord {
            path: name.into(),
            size: 10,
            modified: chrono::Utc::now(),
            extension: ".txt".to_string(),
            owner: "svc".to_string(),
        }
    }

    #[test]
    fn test_replay_waits_at_pause_gate() {
        let tmp = tempfile::tempdir().unwrap();
        let request = ScanRequest::new(tmp.path());
        let state = Arc::new(ScanState::new(Duration::from_millis(10)));
        let phase = Arc::new(Mutex::new(ScanPhase::Paused));
        state.pause();

        let (tx, rx) = crossbeam_channel::unbounded();
        let run = ScanRun {
            walker: DirectoryWalker::new(&request.root, request.max_files),
            request,
            tuning: quick_tuning(),
            resolver: Arc::new(PlatformOwnerResolver),
            state: Arc::clone(&state),
            phase: Arc::clone(&phase),
            events: EventSink::new(tx),
            cache: None,
            cache_key: String::new(),
        };
        let records = vec![record("/a.txt"), record("/b.txt"), record("/c.txt")];
        let replay = thread::spawn(move || run.replay(records));

        thread::sleep(Duration::from_millis(60));
        assert!(!replay.is_finished());
        assert_eq!(*phase.lock(), ScanPhase::Paused);
        assert!(!rx
            .try_iter()
            .any(|event| matches!(event, ScanEvent::FileDiscovered(_))));

        *phase.lock() = ScanPhase::Running;
        state.resume();
        let outcome = replay.join().unwrap();
        assert_eq!(outcome.status, ScanStatus::Cached);
        assert_eq!(outcome.totals.file_count, 3);
        assert_eq!(*phase.lock(), ScanPhase::Completed);
    }

    #[test]
    fn test_only_completed_scans_are_cached() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(tmp.path().join(format!("{}.txt", i)), b"x").unwrap();
        }
        let cache = Arc::new(crate::cache::MemoryResultCache::new());
        let controller = ScanController::new()
            .with_tuning(quick_tuning())
            .with_cache(cache.clone());

        let truncated = ScanRequest::new(tmp.path()).with_max_files(2);
        let outcome = controller.start(truncated.clone()).unwrap().wait();
        assert_eq!(outcome.status, ScanStatus::Truncated);
        assert!(cache.lookup(&cache_key(&truncated)).is_none());

        controller.reset().unwrap();
        let full = ScanRequest::new(tmp.path());
        assert_eq!(controller.start(full.clone()).unwrap().wait().status, ScanStatus::Completed);
        assert_eq!(cache.lookup(&cache_key(&full)).map(|records| records.len()), Some(5));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}

use super::queue::DiscoveryQueue;
use super::state::ScanState;
use crate::filter::{self, FileOutcome, FilterSet};
use crate::model::FileRecord;
use crate::platform::OwnerResolver;
use crate::progress::{percent, EventSink, ScanEvent};
use parking_lot::Mutex;
use std::io;
use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{trace, warn};

pub const DEFAULT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub matched: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Everything a worker thread needs, shared by the whole pool.
pub struct WorkerContext {
    pub state: Arc<ScanState>,
    pub queue: DiscoveryQueue,
    pub filters: FilterSet,
    pub resolver: Arc<dyn OwnerResolver>,
    pub events: EventSink,
    pub chunk_size: usize,
    /// Matched records are also collected here when the scan result will be cached.
    pub results: Option<Arc<Mutex<Vec<FileRecord>>>>,
}

impl WorkerContext {
    /// Drain the queue chunk by chunk until discovery is complete and nothing is left,
    /// or until the scan is stopped.
    pub fn run(&self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        while let Some(chunk) = self.next_chunk() {
            stats += self.process_chunk(chunk);
        }
        stats
    }

    fn next_chunk(&self) -> Option<Vec<PathBuf>> {
        let state = &self.state;
        let chunk_size = self.chunk_size.max(1);

        loop {
            if state.is_stopped() || !state.wait_while_paused() {
                return None;
            }

            let mut chunk = Vec::with_capacity(chunk_size);
            while chunk.len() < chunk_size {
                if state.is_stopped() || state.is_paused() {
                    break;
                }
                // Read before polling: if discovery was already complete, an empty poll
                // means the queue is drained for good.
                let complete = state.is_discovery_complete();
                let timeout = if complete {
                    Duration::ZERO
                } else {
                    state.poll_interval()
                };
                match self.queue.try_get(timeout) {
                    Some(path) => chunk.push(path),
                    None if complete || !chunk.is_empty() => break,
                    None => {}
                }
            }

            if !chunk.is_empty() {
                return Some(chunk);
            }
            if state.is_stopped() {
                return None;
            }
            if state.is_discovery_complete() && self.queue.is_empty() {
                return None;
            }
        }
    }

    /// Evaluate every path of the chunk independently. A failing file is reported and
    /// the rest of the chunk still runs.
    pub fn process_chunk(&self, chunk: Vec<PathBuf>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut done = 0usize;

        for path in chunk {
            if self.state.is_stopped() || !self.state.wait_while_paused() {
                break;
            }

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                filter::evaluate(&path, &self.filters, self.resolver.as_ref())
            }))
            .unwrap_or_else(|_| {
                FileOutcome::Failed(format!("{}: panicked while processing", path.display()))
            });

            match outcome {
                FileOutcome::Matched(record) => {
                    self.state.record_match(record.size);
                    if let Some(results) = &self.results {
                        results.lock().push(record.clone());
                    }
                    self.events.emit(ScanEvent::FileDiscovered(record));
                    stats.matched += 1;
                }
                FileOutcome::Skipped(reason) => {
                    trace!("Skipped {}: {:?}", path.display(), reason);
                    stats.skipped += 1;
                }
                FileOutcome::Failed(message) => {
                    warn!("Error processing {}", message);
                    self.events
                        .status(format!("Error processing {}", message));
                    stats.failed += 1;
                }
            }
            done += 1;
        }

        let processed = self.state.add_processed(done);
        if self.state.is_discovery_complete() {
            let total = self.state.discovered();
            self.events.emit(ScanEvent::ProcessingProgress {
                processed,
                total,
                percent: percent(processed, total),
            });
        }
        stats
    }
}

pub fn spawn_workers(
    context: Arc<WorkerContext>,
    count: usize,
) -> io::Result<Vec<JoinHandle<WorkerStats>>> {
    (0..count.max(1))
        .map(|index| {
            let context = Arc::clone(&context);
            thread::Builder::new()
                .name(format!("scan-worker-{}", index))
                .spawn(move || context.run())
        })
        .collect()
}

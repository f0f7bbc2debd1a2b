//! Discovery and filtering: one walker thread feeding a bounded queue drained by a worker pool.

pub mod queue;
pub mod state;
pub mod walk;
pub mod worker;

pub use queue::{DiscoveryQueue, Stopped, DEFAULT_QUEUE_CAPACITY};
pub use state::{DirSkipReason, DiscoveryGuard, ScanState, ScanTotals};
pub use walk::{DirectoryWalker, QueueSink, WalkSink, WalkStatus, WalkSummary};
pub use worker::{WorkerContext, WorkerStats, DEFAULT_CHUNK_SIZE};

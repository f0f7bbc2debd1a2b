pub mod analysis;
pub mod cache;
pub mod config;
pub mod dupes;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hasher;
pub mod model;
pub mod platform;
pub mod progress;
pub mod scanner;

pub use cache::{cache_key, MemoryResultCache, ResultCache};
pub use config::AppConfig;
pub use dupes::{delete_all_but_first, find_duplicates, verify_groups, DuplicateSearch};
pub use engine::{ScanController, ScanHandle, ScanOutcome, ScanPhase, ScanStatus, ScanTuning};
pub use error::Error;
pub use model::{DeletionReport, DuplicateGroup, FileRecord, ScanRequest, SizeCategory};
pub use progress::{ProgressReporter, ScanEvent, SilentReporter};

use crate::model::{bytes_to_gib, FileRecord};
use crossbeam_channel::Sender;

/// Everything a running scan tells its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    FileDiscovered(FileRecord),
    /// Files published by the walker so far and the current (capped) estimate of the total.
    DiscoveryProgress {
        discovered: usize,
        estimated_total: usize,
    },
    /// Only sent once discovery has finished and the total is known.
    ProcessingProgress {
        processed: usize,
        total: usize,
        percent: u8,
    },
    StatusMessage(String),
    ScanComplete {
        total_bytes: u64,
        file_count: u64,
    },
    ScanAborted {
        total_bytes: u64,
        file_count: u64,
    },
}

impl ScanEvent {
    pub fn total_gib(&self) -> Option<f64> {
        match self {
            ScanEvent::ScanComplete { total_bytes, .. }
            | ScanEvent::ScanAborted { total_bytes, .. } => Some(bytes_to_gib(*total_bytes)),
            _ => None,
        }
    }
}

/// Sending half of the scan event stream. Never blocks; events for a dropped receiver are discarded.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<ScanEvent>,
}

impl EventSink {
    pub fn new(tx: Sender<ScanEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ScanEvent::StatusMessage(message.into()));
    }
}

/// Trait for reporting duplicate search and removal progress.
///
/// CLI implements with indicatif; library callers can pass [`SilentReporter`].
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_size_pass_progress(&self, _files_checked: usize, _total_files: usize) {}
    fn on_hash_start(&self, _total_files: usize) {}
    fn on_hash_progress(&self, _files_hashed: usize, _total_files: usize) {}
    fn on_hash_complete(&self, _total_groups: usize, _duration_secs: f64) {}
    fn on_delete_progress(&self, _files_done: usize, _total_files: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

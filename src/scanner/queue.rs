use super::state::ScanState;
use crossbeam_channel::{self as channel, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Returned by [`DiscoveryQueue::put`] when the scan was stopped while waiting for room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

/// Fixed-capacity FIFO between the walker and the workers.
///
/// Both ends stay open for the lifetime of the scan; consumers finish when the scan state
/// reports discovery complete and the queue is empty.
#[derive(Debug, Clone)]
pub struct DiscoveryQueue {
    tx: Sender<PathBuf>,
    rx: Receiver<PathBuf>,
    capacity: usize,
}

impl DiscoveryQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue `path`, waiting while the queue is full. The stop flag is re-checked
    /// every poll interval.
    pub fn put(&self, mut path: PathBuf, state: &ScanState) -> Result<(), Stopped> {
        loop {
            if state.is_stopped() {
                return Err(Stopped);
            }
            match self.tx.send_timeout(path, state.poll_interval()) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => path = returned,
                // The queue owns its receiver, so this only happens during teardown.
                Err(SendTimeoutError::Disconnected(_)) => return Err(Stopped),
            }
        }
    }

    pub fn try_get(&self, timeout: Duration) -> Option<PathBuf> {
        match self.rx.recv_timeout(timeout) {
            Ok(path) => Some(path),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Why the walker refused to read a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSkipReason {
    Hidden,
    Ignored,
    AccessDenied,
    Unreadable(String),
}

impl fmt::Display for DirSkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirSkipReason::Hidden => f.write_str("hidden or system directory"),
            DirSkipReason::Ignored => f.write_str("matches an ignore pattern"),
            DirSkipReason::AccessDenied => f.write_str("access denied"),
            DirSkipReason::Unreadable(e) => write!(f, "unreadable: {}", e),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanTotals {
    pub file_count: u64,
    pub total_bytes: u64,
}

/// Blocks threads while a scan is paused.
///
/// Waiters wake on `resume`, on `wake_all`, or every poll interval so a stop request
/// raised while paused is seen promptly.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: Mutex<bool>,
    cond: Condvar,
}

impl PauseGate {
    pub fn pause(&self) {
        *self.paused.lock() = true;
    }

    pub fn resume(&self) {
        let mut paused = self.paused.lock();
        *paused = false;
        self.cond.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    pub fn wake_all(&self) {
        let _paused = self.paused.lock();
        self.cond.notify_all();
    }

    /// Returns `false` when `stop` was raised before or during the wait.
    pub fn wait_while_paused(&self, stop: &AtomicBool, poll: Duration) -> bool {
        let mut paused = self.paused.lock();
        while *paused {
            if stop.load(Ordering::Acquire) {
                return false;
            }
            self.cond.wait_for(&mut paused, poll);
        }
        !stop.load(Ordering::Acquire)
    }
}

/// Mutable state of a single scan run, shared by the walker, the workers and the controller.
#[derive(Debug)]
pub struct ScanState {
    totals: Mutex<ScanTotals>,
    skipped: DashMap<PathBuf, DirSkipReason>,
    discovery_complete: AtomicBool,
    stop: AtomicBool,
    truncated: AtomicBool,
    gate: PauseGate,
    discovered: AtomicUsize,
    processed: AtomicUsize,
    poll_interval: Duration,
}

impl ScanState {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            totals: Mutex::new(ScanTotals::default()),
            skipped: DashMap::new(),
            discovery_complete: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            truncated: AtomicBool::new(false),
            gate: PauseGate::default(),
            discovered: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn record_match(&self, size: u64) {
        let mut totals = self.totals.lock();
        totals.file_count += 1;
        totals.total_bytes += size;
    }

    pub fn totals(&self) -> ScanTotals {
        *self.totals.lock()
    }

    /// Records `path` as skipped. The first reason wins; returns whether it was new.
    pub fn mark_skipped(&self, path: &Path, reason: DirSkipReason) -> bool {
        let mut inserted = false;
        self.skipped.entry(path.to_path_buf()).or_insert_with(|| {
            inserted = true;
            reason
        });
        inserted
    }

    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skipped.contains_key(path)
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn skipped_dirs(&self) -> Vec<(PathBuf, DirSkipReason)> {
        self.skipped
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Returns `true` only for the call that actually flipped the flag.
    pub fn mark_discovery_complete(&self) -> bool {
        !self.discovery_complete.swap(true, Ordering::AcqRel)
    }

    pub fn is_discovery_complete(&self) -> bool {
        self.discovery_complete.load(Ordering::Acquire)
    }

    /// Raise the stop flag and wake anything parked on the pause gate.
    /// Returns `true` for the first caller only.
    pub fn request_stop(&self) -> bool {
        let first = !self.stop.swap(true, Ordering::AcqRel);
        self.gate.wake_all();
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Park while paused. Returns `false` if the scan was stopped.
    pub fn wait_while_paused(&self) -> bool {
        self.gate.wait_while_paused(&self.stop, self.poll_interval)
    }

    pub fn mark_truncated(&self) {
        self.truncated.store(true, Ordering::Release);
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated.load(Ordering::Acquire)
    }

    pub fn add_discovered(&self) -> usize {
        self.discovered.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn discovered(&self) -> usize {
        self.discovered.load(Ordering::Acquire)
    }

    pub fn add_processed(&self, count: usize) -> usize {
        self.processed.fetch_add(count, Ordering::AcqRel) + count
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Acquire)
    }
}

/// Sets discovery-complete when dropped, whichever way the walker exits.
pub struct DiscoveryGuard<'a>(pub &'a ScanState);

impl Drop for DiscoveryGuard<'_> {
    fn drop(&mut self) {
        self.0.mark_discovery_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    const POLL: Duration = Duration::from_millis(10);

    #[test]
    fn test_skip_set_is_write_once() {
        let state = ScanState::new(POLL);
        let dir = Path::new("/data/private");
        assert!(state.mark_skipped(dir, DirSkipReason::AccessDenied));
        assert!(!state.mark_skipped(dir, DirSkipReason::Hidden));
        assert!(state.is_skipped(dir));
        assert_eq!(state.skipped_dirs(), vec![(dir.to_path_buf(), DirSkipReason::AccessDenied)]);
    }

    #[test]
    fn test_discovery_complete_flips_once() {
        let state = ScanState::new(POLL);
        {
            let _guard = DiscoveryGuard(&state);
            assert!(!state.is_discovery_complete());
        }
        assert!(state.is_discovery_complete());
        assert!(!state.mark_discovery_complete());
    }

    #[test]
    fn test_guard_runs_on_panic() {
        let state = Arc::new(ScanState::new(POLL));
        let inner = Arc::clone(&state);
        let result = thread::spawn(move || {
            let _guard = DiscoveryGuard(&inner);
            panic!("walker blew up");
        })
        .join();
        assert!(result.is_err());
        assert!(state.is_discovery_complete());
    }

    #[test]
    fn test_pause_blocks_until_resume() {
        let state = Arc::new(ScanState::new(POLL));
        state.pause();

        let waiter = Arc::clone(&state);
        let handle = thread::spawn(move || waiter.wait_while_paused());

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        state.resume();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_stop_releases_paused_waiters() {
        let state = Arc::new(ScanState::new(Duration::from_secs(5)));
        state.pause();

        let waiter = Arc::clone(&state);
        let handle = thread::spawn(move || waiter.wait_while_paused());

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        assert!(state.request_stop());
        assert!(!state.request_stop());
        assert!(!handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_totals_accumulate() {
        let state = Arc::new(ScanState::new(POLL));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for _ in 0..250 {
                        state.record_match(4);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(
            state.totals(),
            ScanTotals {
                file_count: 1000,
                total_bytes: 4000
            }
        );
    }
}

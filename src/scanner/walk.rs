use super::queue::{DiscoveryQueue, Stopped};
use super::state::{DirSkipReason, ScanState};
use crate::progress::{EventSink, ScanEvent};
use glob::Pattern;
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_PROGRESS_INTERVAL: usize = 100;

/// Receives what the walker finds.
pub trait WalkSink {
    /// Hand a discovered file downstream. May block; `Err` means the scan was stopped.
    fn publish(&mut self, path: PathBuf) -> Result<(), Stopped>;
    fn skipped_dir(&mut self, _path: &Path, _reason: &DirSkipReason) {}
    fn progress(&mut self, _published: usize, _estimated_total: usize) {}
    fn status(&mut self, _message: String) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    Finished,
    /// The file cap was reached before the tree was exhausted.
    Truncated,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub status: WalkStatus,
    pub published: usize,
    pub estimated_total: usize,
}

#[derive(Debug, PartialEq, Eq)]
enum Admission {
    Admit,
    AlreadySkipped,
    Deny(DirSkipReason),
}

/// Depth-first directory walker driven by an explicit stack.
///
/// Publishes regular files only. Symlinks are neither followed nor published.
#[derive(Debug, Clone)]
pub struct DirectoryWalker {
    root: PathBuf,
    cap: usize,
    progress_interval: usize,
    ignore_patterns: Vec<Pattern>,
}

impl DirectoryWalker {
    pub fn new(root: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            root: root.into(),
            cap,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            ignore_patterns: Vec::new(),
        }
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn with_ignore_patterns(mut self, globs: &[String]) -> Result<Self, glob::PatternError> {
        self.ignore_patterns = globs
            .iter()
            .map(|glob| Pattern::new(glob))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn walk(&self, state: &ScanState, sink: &mut dyn WalkSink) -> WalkSummary {
        let mut stack = vec![self.root.clone()];
        let mut published = 0usize;
        let mut estimated_total = 0usize;
        let mut status = WalkStatus::Finished;
        let mut at_root = true;

        'walk: while let Some(dir) = stack.pop() {
            if !checkpoint(state) {
                status = WalkStatus::Aborted;
                break;
            }

            let is_root = std::mem::replace(&mut at_root, false);
            match self.admit(&dir, is_root, state) {
                Admission::Admit => {}
                Admission::AlreadySkipped => continue,
                Admission::Deny(reason) => {
                    record_skip(&dir, reason, state, sink);
                    continue;
                }
            }

            let entries = match read_entries(&dir, sink) {
                Ok(entries) => entries,
                Err(err) => {
                    let reason = if err.kind() == io::ErrorKind::PermissionDenied {
                        DirSkipReason::AccessDenied
                    } else {
                        DirSkipReason::Unreadable(err.to_string())
                    };
                    record_skip(&dir, reason, state, sink);
                    continue;
                }
            };
            estimated_total += entries.len();

            let mut subdirs = Vec::new();
            for entry in entries {
                if !checkpoint(state) {
                    status = WalkStatus::Aborted;
                    break 'walk;
                }
                if published >= self.cap {
                    status = WalkStatus::Truncated;
                    break 'walk;
                }

                let path = entry.path();
                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(err) => {
                        warn!("Error reading file type of {}: {}", path.display(), err);
                        sink.status(format!("Error scanning {}: {}", path.display(), err));
                        continue;
                    }
                };

                if file_type.is_file() {
                    if self.is_ignored(&path) {
                        continue;
                    }
                    if sink.publish(path).is_err() {
                        status = WalkStatus::Aborted;
                        break 'walk;
                    }
                    published += 1;
                    if published % self.progress_interval == 0 {
                        sink.progress(published, estimated_total.min(self.cap));
                    }
                } else if file_type.is_dir() && !state.is_skipped(&path) {
                    subdirs.push(path);
                }
            }
            // Reversed so the first subdirectory is popped first.
            stack.extend(subdirs.into_iter().rev());
        }

        if status == WalkStatus::Truncated {
            state.mark_truncated();
            info!("Maximum of {} files reached, discovery stopped", self.cap);
            sink.status(format!("Maximum of {} files reached", self.cap));
        }
        sink.progress(published, estimated_total.min(self.cap));

        WalkSummary {
            status,
            published,
            estimated_total,
        }
    }

    fn admit(&self, dir: &Path, is_root: bool, state: &ScanState) -> Admission {
        if state.is_skipped(dir) {
            return Admission::AlreadySkipped;
        }
        if self.is_ignored(dir) {
            return Admission::Deny(DirSkipReason::Ignored);
        }
        let metadata = match fs::metadata(dir) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                return Admission::Deny(DirSkipReason::AccessDenied)
            }
            Err(err) => return Admission::Deny(DirSkipReason::Unreadable(err.to_string())),
        };
        // The root was asked for explicitly, so its own name never hides it.
        if !is_root && crate::platform::is_hidden_or_system(dir, &metadata) {
            return Admission::Deny(DirSkipReason::Hidden);
        }
        Admission::Admit
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }
}

fn checkpoint(state: &ScanState) -> bool {
    !state.is_stopped() && state.wait_while_paused()
}

fn read_entries(dir: &Path, sink: &mut dyn WalkSink) -> io::Result<Vec<DirEntry>> {
    let entries = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Error reading entry in directory {}: {}", dir.display(), err);
                sink.status(format!("Error scanning {}: {}", dir.display(), err));
                None
            }
        })
        .collect();
    Ok(entries)
}

fn record_skip(dir: &Path, reason: DirSkipReason, state: &ScanState, sink: &mut dyn WalkSink) {
    if state.mark_skipped(dir, reason.clone()) {
        debug!("Skipping directory {}: {}", dir.display(), reason);
        sink.skipped_dir(dir, &reason);
    }
}

/// Sink used by a live scan: files go to the discovery queue, everything else to the event stream.
pub struct QueueSink<'a> {
    pub queue: &'a DiscoveryQueue,
    pub state: &'a ScanState,
    pub events: &'a EventSink,
}

impl WalkSink for QueueSink<'_> {
    fn publish(&mut self, path: PathBuf) -> Result<(), Stopped> {
        self.queue.put(path, self.state)?;
        self.state.add_discovered();
        Ok(())
    }

    fn skipped_dir(&mut self, path: &Path, reason: &DirSkipReason) {
        self.events
            .status(format!("Skipping {}: {}", path.display(), reason));
    }

    fn progress(&mut self, published: usize, estimated_total: usize) {
        self.events.emit(ScanEvent::DiscoveryProgress {
            discovered: published,
            estimated_total,
        });
    }

    fn status(&mut self, message: String) {
        self.events.status(message);
    }
}

use crate::model::DeletionReport;
use crate::progress::ProgressReporter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStatus {
    File,
    Directory,
    Missing,
}

impl PathStatus {
    pub fn of(path: &Path) -> Self {
        match fs::symlink_metadata(path) {
            Ok(metadata) if metadata.is_dir() => PathStatus::Directory,
            Ok(_) => PathStatus::File,
            Err(_) => PathStatus::Missing,
        }
    }
}

/// One path per line; surrounding whitespace and blank lines are dropped.
pub fn parse_path_list(text: &str) -> Vec<PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub fn validate_paths(paths: &[PathBuf]) -> Vec<(PathBuf, PathStatus)> {
    paths
        .iter()
        .map(|path| (path.clone(), PathStatus::of(path)))
        .collect()
}

/// Delete every path that is a file. Directories are never removed and missing paths
/// are skipped; both count toward neither total. Stops between files once `cancel` is set.
pub fn remove_files(
    paths: &[PathBuf],
    cancel: &AtomicBool,
    reporter: &dyn ProgressReporter,
) -> DeletionReport {
    let mut report = DeletionReport::default();

    for (done, path) in paths.iter().enumerate() {
        if cancel.load(Ordering::Acquire) {
            info!("Removal cancelled after {} of {} paths", done, paths.len());
            break;
        }
        match PathStatus::of(path) {
            PathStatus::File => match fs::remove_file(path) {
                Ok(()) => report.record_deleted(),
                Err(e) => {
                    warn!("Error deleting {}: {}", path.display(), e);
                    report.record_failure(path, e);
                }
            },
            PathStatus::Directory => warn!("Not removing directory {}", path.display()),
            PathStatus::Missing => warn!("Path not found: {}", path.display()),
        }
        reporter.on_delete_progress(done + 1, paths.len());
    }

    info!("Removed {} files, {} failed", report.deleted, report.failed);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;

    #[test]
    fn test_parse_path_list() {
        let text = "  /srv/a.txt \n\n\t\n/srv/b c.txt\r\n";
        assert_eq!(
            parse_path_list(text),
            vec![PathBuf::from("/srv/a.txt"), PathBuf::from("/srv/b c.txt")]
        );
    }

    #[test]
    fn test_only_files_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("old.bak");
        let dir = tmp.path().join("keep");
        let missing = tmp.path().join("missing.bak");
        fs::write(&file, b"x").unwrap();
        fs::create_dir(&dir).unwrap();

        let paths = vec![file.clone(), dir.clone(), missing.clone()];
        let statuses: Vec<_> = validate_paths(&paths).into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            statuses,
            vec![PathStatus::File, PathStatus::Directory, PathStatus::Missing]
        );

        let report = remove_files(&paths, &AtomicBool::new(false), &SilentReporter);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);
        assert!(!file.exists());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_cancelled_removal_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a");
        fs::write(&file, b"x").unwrap();

        let report = remove_files(&[file.clone()], &AtomicBool::new(true), &SilentReporter);
        assert_eq!(report, DeletionReport::default());
        assert!(file.exists());
    }
}

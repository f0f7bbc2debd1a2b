use chrono::{DateTime, Utc};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

pub const DEFAULT_IDLE_DAYS: u32 = 180;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedFile {
    pub path: PathBuf,
    pub size: u64,
    pub last_used: DateTime<Utc>,
}

/// The later of access and modification time. Platforms without atime fall back to mtime.
pub fn last_used(metadata: &Metadata) -> Option<SystemTime> {
    match (metadata.accessed().ok(), metadata.modified().ok()) {
        (Some(accessed), Some(modified)) => Some(accessed.max(modified)),
        (accessed, modified) => accessed.or(modified),
    }
}

/// Files among `paths` not used within the last `idle_days`, oldest first.
/// Directories and paths that cannot be read are left out.
pub fn find_unused<P: AsRef<Path>>(paths: &[P], idle_days: u32, now: SystemTime) -> Vec<UnusedFile> {
    let cutoff = now
        .checked_sub(Duration::from_secs(u64::from(idle_days) * SECS_PER_DAY))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut unused: Vec<UnusedFile> = paths
        .iter()
        .filter_map(|path| {
            let path = path.as_ref();
            let metadata = match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => return None,
                Err(e) => {
                    debug!("Skipping '{}': {}", path.display(), e);
                    return None;
                }
            };
            let used = last_used(&metadata)?;
            (used < cutoff).then(|| UnusedFile {
                path: path.to_path_buf(),
                size: metadata.len(),
                last_used: used.into(),
            })
        })
        .collect();

    unused.sort_by(|a, b| a.last_used.cmp(&b.last_used).then_with(|| a.path.cmp(&b.path)));
    unused
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;

    fn days_ago(now: SystemTime, days: u64) -> FileTime {
        FileTime::from_system_time(now - Duration::from_secs(days * SECS_PER_DAY))
    }

    #[test]
    fn test_recently_read_file_is_in_use() {
        let tmp = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let path = tmp.path().join("report.docx");
        fs::write(&path, b"q3").unwrap();
        filetime::set_file_times(&path, days_ago(now, 2), days_ago(now, 400)).unwrap();

        assert!(find_unused(&[&path], 180, now).is_empty());
    }

    #[test]
    fn test_oldest_first() {
        let tmp = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let newer = tmp.path().join("newer.log");
        let older = tmp.path().join("older.log");
        fs::write(&newer, b"1234").unwrap();
        fs::write(&older, b"12").unwrap();
        filetime::set_file_times(&newer, days_ago(now, 200), days_ago(now, 200)).unwrap();
        filetime::set_file_times(&older, days_ago(now, 900), days_ago(now, 900)).unwrap();

        let unused = find_unused(&[&newer, &older, &tmp.path().to_path_buf()], 180, now);
        let paths: Vec<_> = unused.iter().map(|u| u.path.clone()).collect();
        assert_eq!(paths, vec![older, newer]);
        assert_eq!(unused[0].size, 2);
    }
}

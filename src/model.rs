use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

pub const DEFAULT_MAX_FILES: usize = 50_000;
const MAX_DEFAULT_WORKERS: usize = 32;

/// Owner string used when the resolver cannot name the owner.
pub const UNKNOWN_OWNER: &str = "Unknown";

/// Size buckets a scan can be narrowed to. Bounds are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    /// `[0, 10 MiB)`
    Small,
    /// `[10 MiB, 100 MiB)`
    Medium,
    /// `[100 MiB, ∞)`
    Large,
}

impl SizeCategory {
    pub fn bounds(self) -> (u64, Option<u64>) {
        match self {
            SizeCategory::Small => (0, Some(10 * MIB)),
            SizeCategory::Medium => (10 * MIB, Some(100 * MIB)),
            SizeCategory::Large => (100 * MIB, None),
        }
    }

    pub fn contains(self, size: u64) -> bool {
        let (min, max) = self.bounds();
        size >= min && max.map_or(true, |max| size < max)
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
        };
        f.write_str(name)
    }
}

/// Parameters of one scan. Built once by the caller and never changed after `start`.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub root: PathBuf,
    /// Only files last modified more than this many years ago match. `0` disables the filter.
    pub min_age_years: u32,
    /// Lowercase extensions with a leading dot. Empty matches everything.
    pub extensions: BTreeSet<String>,
    /// Whitespace separated tokens that must all occur in the owner name.
    pub owner_filter: Option<String>,
    pub size_category: Option<SizeCategory>,
    pub max_files: usize,
    pub workers: usize,
    pub ignore_patterns: Vec<String>,
    pub bypass_cache: bool,
}

impl ScanRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            min_age_years: 0,
            extensions: BTreeSet::new(),
            owner_filter: None,
            size_category: None,
            max_files: DEFAULT_MAX_FILES,
            workers: default_workers(),
            ignore_patterns: Vec::new(),
            bypass_cache: false,
        }
    }

    pub fn with_min_age_years(mut self, years: u32) -> Self {
        self.min_age_years = years;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    pub fn with_owner_filter(mut self, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        self.owner_filter = if owner.trim().is_empty() {
            None
        } else {
            Some(owner)
        };
        self
    }

    pub fn with_size_category(mut self, category: Option<SizeCategory>) -> Self {
        self.size_category = category;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn bypass_cache(mut self, bypass: bool) -> Self {
        self.bypass_cache = bypass;
        self
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_files == 0 {
            return Err(crate::Error::InvalidRequest(
                "max_files must be at least 1".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(crate::Error::InvalidRequest(
                "workers must be at least 1".to_string(),
            ));
        }
        if !self.root.is_dir() {
            return Err(crate::Error::InvalidRequest(format!(
                "root {} is not a readable directory",
                self.root.display()
            )));
        }
        Ok(())
    }
}

/// Twice the available cores, capped at 32.
pub fn default_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 2).min(MAX_DEFAULT_WORKERS)
}

/// `"PDF"`, `".pdf"` and `" .Pdf "` all become `".pdf"`. Blank input yields `None`.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(format!(".{}", ext))
    }
}

/// Lowercase extension of `path` with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// A file that passed every filter of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub extension: String,
    pub owner: String,
}

/// Paths sharing one exact size and one content fingerprint.
///
/// When `sampled` is set the fingerprint only covers the head and tail of each file,
/// so files that differ only in the middle end up in the same group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub fingerprint: u64,
    pub size: u64,
    pub sampled: bool,
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.paths.len().saturating_sub(1) as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    pub deleted: usize,
    pub failed: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl DeletionReport {
    pub fn record_deleted(&mut self) {
        self.deleted += 1;
    }

    pub fn record_failure(&mut self, path: &Path, reason: impl fmt::Display) {
        self.failed += 1;
        self.failures.push((path.to_path_buf(), reason.to_string()));
    }
}

pub fn bytes_to_gib(bytes: u64) -> f64 {
    bytes as f64 / GIB as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension("PDF"), Some(".pdf".to_string()));
        assert_eq!(normalize_extension(" .Docx "), Some(".docx".to_string()));
        assert_eq!(normalize_extension("  "), None);
        assert_eq!(normalize_extension("."), None);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("/a/b/Report.PDF")), ".pdf");
        assert_eq!(extension_of(Path::new("/a/b/archive.tar.gz")), ".gz");
        assert_eq!(extension_of(Path::new("/a/b/Makefile")), "");
    }

    #[test]
    fn test_request_builder_normalizes() {
        let request = ScanRequest::new("/tmp")
            .with_extensions(["PDF", ".docx", ""])
            .with_owner_filter("   ");
        assert_eq!(request.extensions.len(), 2);
        assert!(request.extensions.contains(".pdf"));
        assert!(request.extensions.contains(".docx"));
        assert!(request.owner_filter.is_none());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let request = ScanRequest::new(tmp.path()).with_max_files(0);
        assert!(matches!(
            request.validate(),
            Err(crate::Error::InvalidRequest(_))
        ));
        assert!(ScanRequest::new(tmp.path()).validate().is_ok());
    }

    #[test]
    fn test_wasted_bytes() {
        let group = DuplicateGroup {
            fingerprint: 1,
            size: 100,
            sampled: false,
            paths: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(group.wasted_bytes(), 200);
    }
}

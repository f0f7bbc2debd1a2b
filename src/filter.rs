//! Per-file predicates applied by the scan workers.
//!
//! Checks run cheapest first and stop at the first rejection: existence, size bucket,
//! age, extension, then owner (the only check that needs an extra lookup).

use crate::model::{extension_of, FileRecord, ScanRequest, SizeCategory};
use crate::platform::OwnerResolver;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

/// Why a file did not become a [`FileRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Deleted between discovery and processing.
    Vanished,
    Size,
    Age,
    Extension,
    Owner,
}

#[derive(Debug)]
pub enum FileOutcome {
    Matched(FileRecord),
    Skipped(SkipReason),
    Failed(String),
}

/// The filters of one [`ScanRequest`], resolved against a fixed "now".
#[derive(Debug, Clone)]
pub struct FilterSet {
    size_category: Option<SizeCategory>,
    cutoff: Option<SystemTime>,
    extensions: BTreeSet<String>,
    owner_tokens: Vec<String>,
}

impl FilterSet {
    pub fn new(request: &ScanRequest, now: SystemTime) -> Self {
        Self {
            size_category: request.size_category,
            cutoff: age_cutoff(request.min_age_years, now),
            extensions: request.extensions.clone(),
            owner_tokens: request
                .owner_filter
                .as_deref()
                .map(owner_tokens)
                .unwrap_or_default(),
        }
    }

    pub fn size_matches(&self, size: u64) -> bool {
        self.size_category
            .map_or(true, |category| category.contains(size))
    }

    pub fn age_matches(&self, modified: SystemTime) -> bool {
        self.cutoff.map_or(true, |cutoff| modified < cutoff)
    }

    pub fn extension_matches(&self, extension: &str) -> bool {
        self.extensions.is_empty() || self.extensions.contains(extension)
    }

    pub fn owner_matches(&self, owner: &str) -> bool {
        owner_matches(&self.owner_tokens, owner)
    }
}

/// `now - years * 365 days`, or `None` when `years` is zero.
pub fn age_cutoff(years: u32, now: SystemTime) -> Option<SystemTime> {
    if years == 0 {
        return None;
    }
    let span = Duration::from_secs(u64::from(years) * SECONDS_PER_YEAR);
    Some(now.checked_sub(span).unwrap_or(UNIX_EPOCH))
}

pub fn owner_tokens(filter: &str) -> Vec<String> {
    filter
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect()
}

/// Every token must be a substring of the lowercased owner.
pub fn owner_matches(tokens: &[String], owner: &str) -> bool {
    let owner = owner.to_lowercase();
    tokens.iter().all(|token| owner.contains(token.as_str()))
}

/// Run the whole pipeline for one discovered path.
pub fn evaluate(path: &Path, filters: &FilterSet, resolver: &dyn OwnerResolver) -> FileOutcome {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return FileOutcome::Skipped(SkipReason::Vanished)
        }
        Err(e) => return FileOutcome::Failed(format!("{}: {}", path.display(), e)),
    };

    let size = metadata.len();
    if !filters.size_matches(size) {
        return FileOutcome::Skipped(SkipReason::Size);
    }

    let modified = match metadata.modified() {
        Ok(modified) => modified,
        Err(e) => return FileOutcome::Failed(format!("{}: {}", path.display(), e)),
    };
    if !filters.age_matches(modified) {
        return FileOutcome::Skipped(SkipReason::Age);
    }

    let extension = extension_of(path);
    if !filters.extension_matches(&extension) {
        return FileOutcome::Skipped(SkipReason::Extension);
    }

    let owner = resolver.resolve_or_unknown(path);
    if !filters.owner_matches(&owner) {
        return FileOutcome::Skipped(SkipReason::Owner);
    }

    FileOutcome::Matched(FileRecord {
        path: path.to_path_buf(),
        size,
        modified: DateTime::<Utc>::from(modified),
        extension,
        owner,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MIB;
    use crate::platform::FixedOwnerResolver;

    const DAY: u64 = 24 * 60 * 60;

    fn filters_for(request: &ScanRequest) -> FilterSet {
        FilterSet::new(request, SystemTime::now())
    }

    #[test]
    fn test_size_categories_are_half_open() {
        let sizes = [0, 10 * MIB - 1, 10 * MIB, 99 * MIB, 100 * MIB, 101 * MIB];
        let expect = |category: SizeCategory| -> Vec<u64> {
            let filters = filters_for(&ScanRequest::new("/").with_size_category(Some(category)));
            sizes
                .iter()
                .copied()
                .filter(|size| filters.size_matches(*size))
                .collect()
        };

        assert_eq!(expect(SizeCategory::Small), vec![0, 10 * MIB - 1]);
        assert_eq!(expect(SizeCategory::Medium), vec![10 * MIB, 99 * MIB]);
        assert_eq!(expect(SizeCategory::Large), vec![100 * MIB, 101 * MIB]);

        let unfiltered = filters_for(&ScanRequest::new("/"));
        assert!(sizes.iter().all(|size| unfiltered.size_matches(*size)));
    }

    #[test]
    fn test_age_cutoff() {
        let now = SystemTime::now();
        let filters = FilterSet::new(&ScanRequest::new("/").with_min_age_years(2), now);

        let one_year = now - Duration::from_secs(365 * DAY);
        let two_years_and_a_day = now - Duration::from_secs((2 * 365 + 1) * DAY);
        let three_years = now - Duration::from_secs(3 * 365 * DAY);

        assert!(!filters.age_matches(one_year));
        assert!(filters.age_matches(two_years_and_a_day));
        assert!(filters.age_matches(three_years));
    }

    #[test]
    fn test_zero_years_disables_age_filter() {
        let now = SystemTime::now();
        let filters = FilterSet::new(&ScanRequest::new("/"), now);
        assert!(filters.age_matches(now));
        assert!(age_cutoff(0, now).is_none());
    }

    #[test]
    fn test_owner_tokens_use_and_semantics() {
        let tokens = owner_tokens("leon admin");
        assert!(owner_matches(&tokens, "DESKTOP-1\\Leon-Admin"));
        assert!(!owner_matches(&tokens, "DESKTOP-1\\Leon"));
        assert!(owner_matches(&[], "anyone"));
    }

    #[test]
    fn test_extension_filter() {
        let filters = filters_for(&ScanRequest::new("/").with_extensions(["pdf", ".DOCX"]));
        assert!(filters.extension_matches(".pdf"));
        assert!(filters.extension_matches(".docx"));
        assert!(!filters.extension_matches(".txt"));
        assert!(!filters.extension_matches(""));

        let unfiltered = filters_for(&ScanRequest::new("/"));
        assert!(unfiltered.extension_matches(""));
    }

    #[test]
    fn test_evaluate_builds_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Report.PDF");
        fs::write(&path, b"hello").unwrap();

        let request = ScanRequest::new(tmp.path())
            .with_extensions(["pdf"])
            .with_owner_filter("leon");
        let resolver = FixedOwnerResolver("HOST\\Leon".to_string());

        match evaluate(&path, &filters_for(&request), &resolver) {
            FileOutcome::Matched(record) => {
                assert_eq!(record.size, 5);
                assert_eq!(record.extension, ".pdf");
                assert_eq!(record.owner, "HOST\\Leon");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_rejections() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, b"hello").unwrap();
        let resolver = FixedOwnerResolver("HOST\\Leon".to_string());

        let by_owner = ScanRequest::new(tmp.path()).with_owner_filter("leon admin");
        assert!(matches!(
            evaluate(&path, &filters_for(&by_owner), &resolver),
            FileOutcome::Skipped(SkipReason::Owner)
        ));

        let by_size =
            ScanRequest::new(tmp.path()).with_size_category(Some(SizeCategory::Large));
        assert!(matches!(
            evaluate(&path, &filters_for(&by_size), &resolver),
            FileOutcome::Skipped(SkipReason::Size)
        ));

        let by_age = ScanRequest::new(tmp.path()).with_min_age_years(1);
        assert!(matches!(
            evaluate(&path, &filters_for(&by_age), &resolver),
            FileOutcome::Skipped(SkipReason::Age)
        ));

        let vanished = tmp.path().join("gone.txt");
        assert!(matches!(
            evaluate(&vanished, &filters_for(&by_owner), &resolver),
            FileOutcome::Skipped(SkipReason::Vanished)
        ));
    }
}

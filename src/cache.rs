use crate::model::{FileRecord, ScanRequest};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, trace};

pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Deterministic key for the parameters that decide a scan's result set.
///
/// Worker count, cap and ignore patterns are deliberately not part of it.
pub fn cache_key(request: &ScanRequest) -> String {
    let extensions: Vec<&str> = request.extensions.iter().map(String::as_str).collect();
    format!(
        "{}_{}_{}_{}_{}",
        request.root.display(),
        request.min_age_years,
        extensions.join(","),
        request.owner_filter.as_deref().unwrap_or(""),
        request
            .size_category
            .map(|category| category.to_string())
            .unwrap_or_default(),
    )
}

/// Storage for results of earlier scans. Implementations decide where records live.
pub trait ResultCache: Send + Sync {
    /// Records stored under `key`, if present and still fresh.
    fn lookup(&self, key: &str) -> Option<Vec<FileRecord>>;
    fn store(&self, key: &str, records: Vec<FileRecord>);
}

#[derive(Debug, Clone)]
struct CachedScan {
    stored_at: DateTime<Utc>,
    records: Vec<FileRecord>,
}

/// Process-local cache; entries older than the TTL read as absent.
#[derive(Debug)]
pub struct MemoryResultCache {
    entries: Mutex<HashMap<String, CachedScan>>,
    ttl: Duration,
}

impl Default for MemoryResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryResultCache {
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<FileRecord>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(cached) if now - cached.stored_at < self.ttl => {
                trace!("Result cache hit for {}", key);
                Some(cached.records.clone())
            }
            Some(_) => {
                debug!("Result cache entry for {} expired", key);
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn store_at(&self, key: &str, records: Vec<FileRecord>, now: DateTime<Utc>) {
        self.entries.lock().insert(
            key.to_string(),
            CachedScan {
                stored_at: now,
                records,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryResultCache {
    fn lookup(&self, key: &str) -> Option<Vec<FileRecord>> {
        self.lookup_at(key, Utc::now())
    }

    fn store(&self, key: &str, records: Vec<FileRecord>) {
        self.store_at(key, records, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SizeCategory;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            path: path.into(),
            size: 1,
            modified: Utc::now(),
            extension: ".txt".to_string(),
            owner: "HOST\\leon".to_string(),
        }
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let a = ScanRequest::new("/data")
            .with_min_age_years(2)
            .with_extensions(["pdf", "docx"])
            .with_owner_filter("leon")
            .with_size_category(Some(SizeCategory::Large));
        let b = ScanRequest::new("/data")
            .with_min_age_years(2)
            .with_extensions([".DOCX", ".pdf"])
            .with_owner_filter("leon")
            .with_size_category(Some(SizeCategory::Large))
            .with_workers(3);

        assert_eq!(cache_key(&a), cache_key(&b));
        assert_eq!(cache_key(&a), "/data_2_.docx,.pdf_leon_large");
        assert_ne!(cache_key(&a), cache_key(&a.clone().with_min_age_years(3)));
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = MemoryResultCache::new();
        let stored = Utc::now();
        cache.store_at("k", vec![record("/a.txt")], stored);

        assert_eq!(
            cache.lookup_at("k", stored + Duration::hours(23)).map(|r| r.len()),
            Some(1)
        );
        assert!(cache.lookup_at("k", stored + Duration::hours(24)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_key() {
        let cache = MemoryResultCache::new();
        assert!(cache.lookup("nothing").is_none());
    }
}

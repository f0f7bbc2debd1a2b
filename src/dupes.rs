//! Duplicate search over a finished result set.
//!
//! 1. Group candidate paths by exact size; repeated paths collapse and singletons drop out.
//! 2. Fingerprint the survivors in parallel (full XxHash64, or head+tail samples for large files).
//! 3. Report fingerprint groups with more than one member.
//!
//! Groups from sampled fingerprints carry `sampled = true`; [`verify_groups`] re-hashes them
//! in full before anything is deleted.

use crate::hasher::blake::full_content_hash;
use crate::hasher::{fingerprint_file, SamplingOptions};
use crate::model::{DeletionReport, DuplicateGroup};
use crate::progress::{ProgressReporter, SilentReporter};
use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateSearch {
    Found(Vec<DuplicateGroup>),
    /// The cancel flag was raised; partial groups were discarded.
    Cancelled,
}

pub fn find_duplicates(
    paths: &[PathBuf],
    options: &SamplingOptions,
    cancel: &AtomicBool,
    reporter: &dyn ProgressReporter,
) -> DuplicateSearch {
    let start = Instant::now();

    let size_groups = match group_by_size(paths, cancel, reporter) {
        Some(groups) => groups,
        None => return DuplicateSearch::Cancelled,
    };

    let candidates: Vec<(u64, &PathBuf)> = size_groups
        .iter()
        .flat_map(|(size, paths)| paths.iter().map(move |path| (*size, path)))
        .collect();
    let total = candidates.len();
    debug!(
        "{} size groups, {} candidate files to fingerprint",
        size_groups.len(),
        total
    );
    reporter.on_hash_start(total);

    let hashed = AtomicUsize::new(0);
    let fingerprints: Vec<_> = candidates
        .par_iter()
        .map(|(size, path)| {
            if cancel.load(Ordering::Acquire) {
                return None;
            }
            let fingerprint = match fingerprint_file(path, *size, options) {
                Ok(fingerprint) => Some(fingerprint),
                Err(e) => {
                    warn!("Error fingerprinting '{}': {}", path.display(), e);
                    None
                }
            };
            let done = hashed.fetch_add(1, Ordering::AcqRel) + 1;
            reporter.on_hash_progress(done, total);
            fingerprint
        })
        .collect();

    if cancel.load(Ordering::Acquire) {
        info!("Duplicate search cancelled");
        return DuplicateSearch::Cancelled;
    }

    let mut index: AHashMap<(u64, u64), usize> = AHashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for ((size, path), fingerprint) in candidates.into_iter().zip(fingerprints) {
        let Some(fingerprint) = fingerprint else {
            continue;
        };
        let slot = *index.entry((size, fingerprint.hash)).or_insert_with(|| {
            groups.push(DuplicateGroup {
                fingerprint: fingerprint.hash,
                size,
                sampled: fingerprint.sampled,
                paths: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].paths.push(path.clone());
    }
    groups.retain(|group| group.paths.len() > 1);

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "Found {} duplicate groups among {} files in {:.2}s",
        groups.len(),
        paths.len(),
        elapsed
    );
    reporter.on_hash_complete(groups.len(), elapsed);
    DuplicateSearch::Found(groups)
}

/// Stat every distinct path and keep only sizes shared by two or more files.
/// A path listed twice counts once. `None` if cancelled.
fn group_by_size(
    paths: &[PathBuf],
    cancel: &AtomicBool,
    reporter: &dyn ProgressReporter,
) -> Option<BTreeMap<u64, Vec<PathBuf>>> {
    let mut size_groups: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    let mut seen: AHashSet<&Path> = AHashSet::with_capacity(paths.len());
    for (checked, path) in paths.iter().enumerate() {
        if cancel.load(Ordering::Acquire) {
            info!("Duplicate search cancelled");
            return None;
        }
        reporter.on_size_pass_progress(checked + 1, paths.len());
        if !seen.insert(path.as_path()) {
            debug!("Ignoring repeated path '{}'", path.display());
            continue;
        }
        match fs::metadata(path) {
            Ok(metadata) if metadata.is_file() => {
                size_groups
                    .entry(metadata.len())
                    .or_default()
                    .push(path.clone());
            }
            Ok(_) => {}
            Err(e) => debug!("Skipping '{}': {}", path.display(), e),
        }
    }
    size_groups.retain(|_, paths| paths.len() > 1);
    Some(size_groups)
}

/// Split sampled groups by a full-content BLAKE3 hash so only true duplicates remain.
/// Groups built from full fingerprints pass through untouched.
pub fn verify_groups(groups: Vec<DuplicateGroup>, cancel: &AtomicBool) -> DuplicateSearch {
    let mut verified = Vec::with_capacity(groups.len());

    for group in groups {
        if !group.sampled {
            verified.push(group);
            continue;
        }

        let mut by_hash: Vec<(blake3::Hash, Vec<PathBuf>)> = Vec::new();
        for path in &group.paths {
            if cancel.load(Ordering::Acquire) {
                return DuplicateSearch::Cancelled;
            }
            let hash = match full_content_hash(path) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!("Error verifying '{}': {}", path.display(), e);
                    continue;
                }
            };
            match by_hash.iter_mut().find(|(existing, _)| *existing == hash) {
                Some((_, paths)) => paths.push(path.clone()),
                None => by_hash.push((hash, vec![path.clone()])),
            }
        }

        let before = group.paths.len();
        let split: Vec<DuplicateGroup> = by_hash
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(_, paths)| DuplicateGroup {
                fingerprint: group.fingerprint,
                size: group.size,
                sampled: false,
                paths,
            })
            .collect();
        let after: usize = split.iter().map(|g| g.paths.len()).sum();
        if after < before {
            info!(
                "Verification dropped {} of {} sampled matches for fingerprint {:016x}",
                before - after,
                before,
                group.fingerprint
            );
        }
        verified.extend(split);
    }

    DuplicateSearch::Found(verified)
}

/// Keep the first path of every group and delete the rest.
pub fn delete_all_but_first(groups: &[DuplicateGroup]) -> DeletionReport {
    delete_all_but_first_with(groups, &SilentReporter, |path| fs::remove_file(path))
}

/// Like [`delete_all_but_first`] with a caller-supplied removal function.
/// Every removal is attempted; failures are counted and never stop the rest.
/// A path equal to the kept one is never removed.
pub fn delete_all_but_first_with<F>(
    groups: &[DuplicateGroup],
    reporter: &dyn ProgressReporter,
    mut remove: F,
) -> DeletionReport
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let total: usize = groups
        .iter()
        .map(|group| group.paths.len().saturating_sub(1))
        .sum();
    let mut report = DeletionReport::default();
    let mut done = 0usize;

    for group in groups {
        let Some(keep) = group.paths.first() else {
            continue;
        };
        for path in group.paths.iter().skip(1) {
            if path == keep {
                warn!("Not deleting {}: it is the copy being kept", path.display());
                done += 1;
                reporter.on_delete_progress(done, total);
                continue;
            }
            match remove(path) {
                Ok(()) => {
                    debug!("Deleted duplicate {}", path.display());
                    report.record_deleted();
                }
                Err(e) => {
                    warn!("Error deleting {}: {}", path.display(), e);
                    report.record_failure(path, e);
                }
            }
            done += 1;
            reporter.on_delete_progress(done, total);
        }
    }

    info!(
        "Deleted {} duplicates, {} failed",
        report.deleted, report.failed
    );
    report
}

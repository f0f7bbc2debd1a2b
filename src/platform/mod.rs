#[cfg(unix)]
pub mod unix;
#[cfg(target_os = "windows")]
pub mod windows;

use crate::model::UNKNOWN_OWNER;
use std::fs::Metadata;
use std::path::Path;

/// Maps a path to the identity that owns it.
///
/// Implementations are best effort and return `None` when the owner cannot be named.
pub trait OwnerResolver: Send + Sync {
    fn resolve(&self, path: &Path) -> Option<String>;

    fn resolve_or_unknown(&self, path: &Path) -> String {
        self.resolve(path)
            .unwrap_or_else(|| UNKNOWN_OWNER.to_string())
    }
}

/// Owner lookup using whatever the current platform offers.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformOwnerResolver;

#[cfg(unix)]
impl OwnerResolver for PlatformOwnerResolver {
    fn resolve(&self, path: &Path) -> Option<String> {
        unix::owner_name(path)
    }
}

#[cfg(not(unix))]
impl OwnerResolver for PlatformOwnerResolver {
    fn resolve(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Resolver that reports the same owner for every path.
#[derive(Debug, Clone)]
pub struct FixedOwnerResolver(pub String);

impl OwnerResolver for FixedOwnerResolver {
    fn resolve(&self, _path: &Path) -> Option<String> {
        Some(self.0.clone())
    }
}

#[cfg(target_os = "windows")]
pub fn is_hidden_or_system(path: &Path, metadata: &Metadata) -> bool {
    windows::is_hidden_or_system(path, metadata)
}

#[cfg(not(target_os = "windows"))]
pub fn is_hidden_or_system(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

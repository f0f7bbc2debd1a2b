//! Follow-up operations on paths a scan already produced.

pub mod removal;
pub mod unused;

pub use removal::{parse_path_list, remove_files, validate_paths, PathStatus};
pub use unused::{find_unused, UnusedFile, DEFAULT_IDLE_DAYS};

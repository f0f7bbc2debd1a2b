use clap::{Args, Parser, Subcommand, ValueEnum};
use drive_sweep::analysis::DEFAULT_IDLE_DAYS;
use drive_sweep::SizeCategory;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "drive-sweep")]
#[command(about = "Find stale, oversized and duplicate files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory tree for files matching the given filters
    Scan(ScanArgs),
    /// List files not read or written for a number of days
    Unused(UnusedArgs),
    /// Delete the files named in a newline-separated list
    Remove(RemoveArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    pub root: PathBuf,

    /// Only files last modified more than this many years ago
    #[arg(long, default_value_t = 0)]
    pub min_age_years: u32,

    /// Extensions to keep, e.g. `pdf,.docx`
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Owner name tokens; every token must appear in the owner
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long, value_enum)]
    pub size: Option<SizeArg>,

    /// Stop discovery after this many files
    #[arg(long)]
    pub max_files: Option<usize>,

    #[arg(long)]
    pub workers: Option<usize>,

    /// Print every matching file
    #[arg(long)]
    pub list: bool,

    /// Group the matching files by content
    #[arg(long)]
    pub duplicates: bool,

    /// Re-hash sampled duplicate groups in full before reporting them
    #[arg(long, requires = "duplicates")]
    pub verify: bool,

    /// Delete every duplicate except the first of each group
    #[arg(long, requires = "duplicates")]
    pub delete_duplicates: bool,
}

/// Size buckets: small `< 10 MiB`, medium `10-100 MiB`, large `>= 100 MiB`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SizeArg {
    Small,
    Medium,
    Large,
}

impl From<SizeArg> for SizeCategory {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => SizeCategory::Small,
            SizeArg::Medium => SizeCategory::Medium,
            SizeArg::Large => SizeCategory::Large,
        }
    }
}

#[derive(Debug, Args)]
pub struct UnusedArgs {
    pub root: PathBuf,

    #[arg(long, default_value_t = DEFAULT_IDLE_DAYS)]
    pub days: u32,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// File with one path per line
    pub list: PathBuf,

    /// Only report what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

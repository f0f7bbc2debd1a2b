use crate::engine::{ScanTuning, DEFAULT_POLL_INTERVAL};
use crate::hasher::xxhash::{DEFAULT_SAMPLE_SIZE, DEFAULT_SAMPLE_THRESHOLD};
use crate::hasher::SamplingOptions;
use crate::model::{default_workers, DEFAULT_MAX_FILES, MIB};
use crate::scanner::walk::DEFAULT_PROGRESS_INTERVAL;
use crate::scanner::{DEFAULT_CHUNK_SIZE, DEFAULT_QUEUE_CAPACITY};
use crate::error::Error;
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "DRIVE_SWEEP";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub max_files: usize,
    pub workers: usize,
    pub queue_capacity: usize,
    pub chunk_size: usize,
    pub poll_interval_ms: u64,
    pub progress_interval: usize,
    pub sample_threshold_mib: u64,
    pub sample_size_mib: u64,
    pub ignore_patterns: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            sample_threshold_mib: DEFAULT_SAMPLE_THRESHOLD / MIB,
            sample_size_mib: DEFAULT_SAMPLE_SIZE / MIB,
            ignore_patterns: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn sampling(&self) -> SamplingOptions {
        SamplingOptions {
            threshold: self.sample_threshold_mib * MIB,
            sample_size: self.sample_size_mib.max(1) * MIB,
        }
    }

    pub fn tuning(&self) -> ScanTuning {
        ScanTuning::from(self)
    }
}

/// `Config.{toml,json,yaml,...}` in the working directory if present, then
/// `DRIVE_SWEEP_*` environment variables. Missing keys keep their defaults.
pub fn load_configuration() -> Result<AppConfig, Error> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignore_patterns"),
        )
        .build()?;
    Ok(builder.try_deserialize::<AppConfig>()?)
}

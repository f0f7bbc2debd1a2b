use thiserror::Error;

use crate::engine::ScanPhase;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid ignore pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid scan request: {0}")]
    InvalidRequest(String),

    #[error("Cannot {action} while the scan is {from:?}")]
    InvalidTransition { from: ScanPhase, action: &'static str },
}

pub mod blake;
pub mod xxhash;

pub use xxhash::{fingerprint_file, Fingerprint, SamplingOptions};

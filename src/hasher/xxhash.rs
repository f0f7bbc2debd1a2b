use crate::model::MIB;
use std::fs::File;
use std::hash::Hasher as _;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use twox_hash::XxHash64;

const READ_BUFFER_LENGTH: usize = 64 * 1024; // 64KB

pub const DEFAULT_SAMPLE_THRESHOLD: u64 = 100 * MIB;
pub const DEFAULT_SAMPLE_SIZE: u64 = 4 * MIB;

/// When to stop hashing whole files.
///
/// Files larger than `threshold` are fingerprinted from their first and last `sample_size`
/// bytes only. Two such files that differ only in between hash the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    pub threshold: u64,
    pub sample_size: u64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SAMPLE_THRESHOLD,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub hash: u64,
    pub sampled: bool,
}

/// Hash `file` (whose length is `size`) according to `options`.
pub fn fingerprint_file(file: &Path, size: u64, options: &SamplingOptions) -> io::Result<Fingerprint> {
    let mut f = File::open(file)?;
    let mut hasher = XxHash64::with_seed(0);

    let sampled = size > options.threshold;
    if sampled {
        let sample = options.sample_size.min(size);
        hash_reader(&mut (&mut f).take(sample), &mut hasher)?;
        f.seek(SeekFrom::Start(size - sample))?;
        hash_reader(&mut f.take(sample), &mut hasher)?;
    } else {
        hash_reader(&mut f, &mut hasher)?;
    }

    Ok(Fingerprint {
        hash: hasher.finish(),
        sampled,
    })
}

fn hash_reader<R: Read>(reader: &mut R, hasher: &mut XxHash64) -> io::Result<()> {
    let mut buffer = vec![0; READ_BUFFER_LENGTH];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            return Ok(());
        }
        hasher.write(&buffer[..bytes_read]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn hash_data(data: &[u8]) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(data);
        hasher.finish()
    }

    fn small_sampling() -> SamplingOptions {
        SamplingOptions {
            threshold: 1024,
            sample_size: 128,
        }
    }

    #[test]
    fn test_small_file_hashes_full_content() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("small.bin");
        fs::write(&path, b"shared content xyz").unwrap();

        let fingerprint = fingerprint_file(&path, 18, &SamplingOptions::default()).unwrap();
        assert!(!fingerprint.sampled);
        assert_eq!(fingerprint.hash, hash_data(b"shared content xyz"));
    }

    #[test]
    fn test_large_file_hashes_head_and_tail() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("large.bin");
        let mut content = vec![1u8; 128];
        content.extend(vec![2u8; 2048]);
        content.extend(vec![3u8; 128]);
        fs::write(&path, &content).unwrap();

        let fingerprint = fingerprint_file(&path, content.len() as u64, &small_sampling()).unwrap();
        assert!(fingerprint.sampled);

        let mut expected = vec![1u8; 128];
        expected.extend(vec![3u8; 128]);
        assert_eq!(fingerprint.hash, hash_data(&expected));
    }

    #[test]
    fn test_sampling_ignores_middle_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.bin");
        let b = tmp.path().join("b.bin");
        let mut content = vec![7u8; 4096];
        fs::write(&a, &content).unwrap();
        content[2048] = 0;
        fs::write(&b, &content).unwrap();

        let options = small_sampling();
        let fa = fingerprint_file(&a, 4096, &options).unwrap();
        let fb = fingerprint_file(&b, 4096, &options).unwrap();
        assert_eq!(fa, fb);

        let full = SamplingOptions {
            threshold: u64::MAX,
            sample_size: 128,
        };
        assert_ne!(
            fingerprint_file(&a, 4096, &full).unwrap(),
            fingerprint_file(&b, 4096, &full).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(fingerprint_file(&tmp.path().join("none"), 0, &SamplingOptions::default()).is_err());
    }
}

//! SHA-256 integrity check for downloaded archives.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{AcquisitionError, AcquisitionResult};

const BUFFER_SIZE: usize = 64 * 1024;

/// Computes the SHA-256 of a file as lowercase hex, reading it in fixed-size
/// chunks.
pub fn sha256_file(path: &Path) -> AcquisitionResult<String> {
    let file = File::open(path).map_err(|e| AcquisitionError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let read = reader
            .read(&mut buffer)
            .map_err(|e| AcquisitionError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format_sha256_hex(&hasher.finalize()))
}

/// Checks that the file at `path` hashes to `expected` (hex, any case).
///
/// # Errors
///
/// `Integrity` on mismatch, `Io` if the file cannot be read.
pub fn verify_file(path: &Path, expected: &str) -> AcquisitionResult<()> {
    let actual = sha256_file(path)?;
    let expected = expected.trim().to_lowercase();

    if actual != expected {
        return Err(AcquisitionError::Integrity {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    debug!("SHA256 verified: {}", actual);
    Ok(())
}

/// Runs [`verify_file`] on the blocking pool.
pub async fn verify(path: &Path, expected: &str) -> AcquisitionResult<()> {
    let path: PathBuf = path.to_path_buf();
    let expected = expected.to_string();
    let join_path = path.clone();

    tokio::task::spawn_blocking(move || verify_file(&path, &expected))
        .await
        .map_err(|e| {
            AcquisitionError::io(join_path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?
}

/// Formats a SHA256 hash as lowercase hex without using the hex crate.
fn format_sha256_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_format_sha256_hex() {
        let empty_hash = Sha256::digest(b"");
        assert_eq!(format_sha256_hex(&empty_hash), EMPTY_SHA256);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        verify_file(&path, EMPTY_SHA256).unwrap();
        assert!(verify_file(&path, &"0".repeat(64)).is_err());
    }

    #[test]
    fn test_multi_megabyte_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("large.bin");
        let data: Vec<u8> = (0..5 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let expected = format_sha256_hex(&Sha256::digest(&data));
        verify_file(&path, &expected).unwrap();
    }

    #[test]
    fn test_expected_digest_is_case_insensitive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        verify_file(&path, &EMPTY_SHA256.to_uppercase()).unwrap();
    }

    #[test]
    fn test_mismatch_reports_both_digests() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("file");
        std::fs::write(&path, b"tampered").unwrap();

        match verify_file(&path, EMPTY_SHA256) {
            Err(AcquisitionError::Integrity {
                expected, actual, ..
            }) => {
                assert_eq!(expected, EMPTY_SHA256);
                assert_ne!(actual, EMPTY_SHA256);
                assert_eq!(actual.len(), 64);
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = verify_file(&temp_dir.path().join("missing"), EMPTY_SHA256).unwrap_err();
        assert!(matches!(err, AcquisitionError::Io { .. }));
    }

    #[tokio::test]
    async fn test_async_verify() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        verify(&path, EMPTY_SHA256).await.unwrap();
    }
}

//! Content digests of local files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use shim_schema::{ManifestEntry, Sha256Digest};

/// Result of comparing a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestCheck {
    Match,
    /// `expected` is the manifest token verbatim; it may not be a valid digest.
    Mismatch {
        expected: String,
        actual: Sha256Digest,
    },
}

/// Compute the SHA256 digest of a file, streaming its contents.
pub fn sha256_file(path: &Path) -> std::io::Result<Sha256Digest> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Sha256Digest::new(&hex::encode(hasher.finalize())).map_err(std::io::Error::other)
}

/// Compare the digest of `path` with a manifest entry.
///
/// An entry whose digest does not validate never matches.
pub fn verify_file(path: &Path, entry: &ManifestEntry) -> std::io::Result<DigestCheck> {
    let actual = sha256_file(path)?;
    if entry.matches(&actual) {
        Ok(DigestCheck::Match)
    } else {
        Ok(DigestCheck::Mismatch {
            expected: entry.token.clone(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: &str) -> ManifestEntry {
        ManifestEntry {
            filename: "f".to_string(),
            token: token.to_string(),
            digest: Sha256Digest::new(token),
        }
    }

    // sha256("hello world")
    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn hashes_known_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"hello world").unwrap();
        assert_eq!(sha256_file(&file).unwrap().as_str(), HELLO);
    }

    #[test]
    fn match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"hello world").unwrap();
        assert_eq!(
            verify_file(&file, &entry(&HELLO.to_uppercase())).unwrap(),
            DigestCheck::Match
        );
    }

    #[test]
    fn mismatch_reports_both_digests() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"tampered").unwrap();
        match verify_file(&file, &entry(HELLO)).unwrap() {
            DigestCheck::Mismatch { expected, actual } => {
                assert_eq!(expected, HELLO);
                assert_ne!(actual.as_str(), HELLO);
            }
            DigestCheck::Match => panic!("tampered file must not match"),
        }
    }

    #[test]
    fn invalid_token_never_matches() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"hello world").unwrap();

        match verify_file(&file, &entry("deadbeef")).unwrap() {
            DigestCheck::Mismatch { expected, actual } => {
                assert_eq!(expected, "deadbeef");
                assert_eq!(actual.as_str(), HELLO);
            }
            DigestCheck::Match => panic!("a truncated digest must not match"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_file(&dir.path().join("nope")).is_err());
    }
}

//! SHA256 digests and `checksums.txt` manifests.

use thiserror::Error;

/// Errors produced when validating a digest string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    /// The hex portion is not 64 characters long.
    #[error("Invalid SHA256 digest: expected 64 hex characters, got {len} in '{input}'")]
    Length {
        /// Length of the hex portion.
        len: usize,
        /// The rejected input.
        input: String,
    },

    /// The hex portion contains non-hex characters.
    #[error("Invalid SHA256 digest: contains non-hex characters in '{0}'")]
    NotHex(String),
}

/// A validated SHA256 digest (64 hex characters, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a new `Sha256Digest`, validating the input.
    ///
    /// Accepts strings with or without a `sha256:` prefix and in either case;
    /// the stored form is lowercase so comparisons are case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns an error if the hex portion is not exactly 64 ASCII hex characters.
    pub fn new(s: &str) -> Result<Self, DigestError> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);

        if hex.len() != 64 {
            return Err(DigestError::Length {
                len: hex.len(),
                input: s.to_string(),
            });
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex(s.to_string()));
        }

        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Get the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One `<digest> <filename>` line of a manifest.
///
/// The digest is kept even when it does not validate, so that a line naming
/// an archive always counts as that archive's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Filename field, with any `*` binary-mode marker removed.
    pub filename: String,
    /// Digest field exactly as it appears in the manifest.
    pub token: String,
    /// The digest field, validated.
    pub digest: Result<Sha256Digest, DigestError>,
}

impl ManifestEntry {
    /// Whether `actual` is the digest this entry expects. An entry with an
    /// invalid digest matches nothing.
    pub fn matches(&self, actual: &Sha256Digest) -> bool {
        self.digest.as_ref().is_ok_and(|expected| expected == actual)
    }
}

/// A parsed checksum manifest: `<digest> <filename>` per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: Vec<ManifestEntry>,
}

impl ChecksumManifest {
    /// Parse manifest text in `sha256sum` format.
    ///
    /// Lines with fewer than two fields are ignored. A leading `*` on the
    /// filename (binary-mode marker) is stripped. Lines whose digest does not
    /// validate are kept as entries with an invalid digest.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();

        for (lineno, line) in text.lines().enumerate() {
            let mut fields = line.split_whitespace();
            let (Some(token), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };

            let digest = Sha256Digest::new(token);
            if let Err(e) = &digest {
                tracing::debug!(line = lineno + 1, "unparseable checksum entry: {e}");
            }

            entries.push(ManifestEntry {
                filename: name.strip_prefix('*').unwrap_or(name).to_string(),
                token: token.to_string(),
                digest,
            });
        }

        Self { entries }
    }

    /// Entry for `filename`, matched against the whole filename field. The
    /// first matching line wins, whether or not its digest is valid.
    pub fn expected_for(&self, filename: &str) -> Option<&ManifestEntry> {
        self.entries.iter().find(|entry| entry.filename == filename)
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Release asset naming.
//!
//! Releases are published as `agent-desktop-v{version}-{triple}.tar.gz`
//! next to a single `checksums.txt` covering every platform archive of that
//! version.

use crate::platform::TargetSpec;

/// Default location release archives are downloaded from.
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/lahfir/agent-desktop/releases/download";

/// Filename of the executable inside every release archive.
pub const ARCHIVE_ENTRY_NAME: &str = "agent-desktop";

/// Filename of the checksum manifest published with every release.
pub const MANIFEST_NAME: &str = "checksums.txt";

/// The archive and manifest to fetch for one version on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// Version string, used verbatim.
    pub version: String,
    /// Archive filename, also its key in the checksum manifest.
    pub archive_name: String,
    /// Direct download URL of the archive.
    pub archive_url: String,
    /// Download URL of the checksum manifest.
    pub manifest_url: String,
}

impl ReleaseAsset {
    /// Compute the asset for `version` on `target` under `base_url`.
    ///
    /// The version is opaque: it is neither parsed nor normalized.
    pub fn new(base_url: &str, version: &str, target: &TargetSpec) -> Self {
        let base = base_url.trim_end_matches('/');
        let archive_name = format!("agent-desktop-v{version}-{}.tar.gz", target.triple);
        Self {
            version: version.to_string(),
            archive_url: format!("{base}/v{version}/{archive_name}"),
            manifest_url: format!("{base}/v{version}/{MANIFEST_NAME}"),
            archive_name,
        }
    }
}

//! Explicit configuration for the installer and the launcher.
//!
//! The binaries read the environment once and build these structs; nothing in
//! the pipeline consults `std::env` on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use shim_schema::PlatformKey;
use shim_schema::release::DEFAULT_DOWNLOAD_BASE;
use thiserror::Error;

use crate::io::retry::RetryPolicy;

/// Disables acquisition entirely when truthy.
pub const ENV_SKIP_DOWNLOAD: &str = "AGENT_DESKTOP_SKIP_DOWNLOAD";
/// Local file to install verbatim instead of downloading.
pub const ENV_BINARY_PATH: &str = "AGENT_DESKTOP_BINARY_PATH";
/// Overrides where release archives are fetched from.
pub const ENV_DOWNLOAD_BASE: &str = "AGENT_DESKTOP_DOWNLOAD_BASE";
/// Overrides the directory holding the installed executables.
pub const ENV_BIN_DIR: &str = "AGENT_DESKTOP_BIN_DIR";
/// Overrides the version read from `package.json`.
pub const ENV_VERSION: &str = "AGENT_DESKTOP_VERSION";
/// Overrides host detection, as `<os>-<arch>` (e.g. `darwin-arm64`).
pub const ENV_PLATFORM: &str = "AGENT_DESKTOP_PLATFORM";
/// Set by package managers when they run package scripts and binaries.
pub const ENV_PM_USER_AGENT: &str = "npm_config_user_agent";

/// Proxy variables honoured by the HTTP client, in lookup order.
pub const PROXY_VARS: &[&str] = &["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"];

/// Default wall-clock limit for one download attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default redirect hop limit for one download attempt.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// The slice of `package.json` the shim cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageMetadata {
    pub version: String,
}

impl PackageMetadata {
    /// Read `package.json` from the package root.
    pub fn load(package_root: &Path) -> Result<Self, ConfigError> {
        let path = package_root.join("package.json");
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// Interpret an environment flag value.
///
/// Any non-empty value other than `0`, `false`, `no` or `off`
/// (case-insensitive) counts as set.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !["0", "false", "no", "off"]
            .iter()
            .any(|f| value.eq_ignore_ascii_case(f))
}

/// Platform named by [`ENV_PLATFORM`], if set and well-formed.
pub fn platform_override<F>(lookup: F) -> Option<PlatformKey>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(ENV_PLATFORM).filter(|v| !v.trim().is_empty())?;
    match value.trim().parse() {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!("ignoring {ENV_PLATFORM}: {e}");
            None
        }
    }
}

/// Whether the package manager in charge is Bun, which skips install hooks
/// of untrusted packages.
pub fn bun_detected<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_PM_USER_AGENT).is_some_and(|ua| ua.starts_with("bun/"))
}

/// First proxy variable that is set, for informational logging.
pub fn configured_proxy<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    PROXY_VARS
        .iter()
        .find_map(|var| lookup(var).filter(|v| !v.is_empty()))
}

/// Everything the installer needs to know about its surroundings.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Release version, used verbatim in URLs.
    pub version: String,
    /// Directory holding canonical executables; also the staging area.
    pub bin_dir: PathBuf,
    /// Platform to install for.
    pub platform: PlatformKey,
    /// Skip acquisition entirely.
    pub skip_download: bool,
    /// Pre-built executable to install instead of downloading.
    pub binary_override: Option<PathBuf>,
    /// Base URL of the release host.
    pub download_base: String,
    /// Proxy in effect, if any (informational).
    pub proxy: Option<String>,
    /// Wall-clock limit for one download attempt.
    pub timeout: Duration,
    /// Redirect hop limit for one download attempt.
    pub max_redirects: usize,
    /// Retry schedule wrapped around each download.
    pub retry: RetryPolicy,
    /// Whether to collapse the global entry point after installing.
    pub optimize_symlink: bool,
    /// Global bin directory to optimize; `None` asks npm.
    pub global_bin_dir: Option<PathBuf>,
}

impl InstallConfig {
    /// Defaults for `version` installing into `bin_dir` on the running host.
    pub fn new(version: impl Into<String>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            bin_dir: bin_dir.into(),
            platform: PlatformKey::current(),
            skip_download: false,
            binary_override: None,
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            retry: RetryPolicy::default(),
            optimize_symlink: true,
            global_bin_dir: None,
        }
    }

    /// Apply the environment variables understood by the installer.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.skip_download = lookup(ENV_SKIP_DOWNLOAD).is_some_and(|v| is_truthy(&v));
        self.binary_override = lookup(ENV_BINARY_PATH)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(base) = lookup(ENV_DOWNLOAD_BASE).filter(|v| !v.is_empty()) {
            self.download_base = base;
        }
        if let Some(platform) = platform_override(&lookup) {
            self.platform = platform;
        }
        self.proxy = configured_proxy(&lookup);
        self
    }
}

/// Everything the launcher needs to know.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Directory holding canonical executables.
    pub bin_dir: PathBuf,
    /// Platform whose executable should be run.
    pub platform: PlatformKey,
    /// Add Bun-specific advice to remediation messages.
    pub bun_detected: bool,
}

impl LaunchConfig {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            platform: PlatformKey::current(),
            bun_detected: false,
        }
    }

    /// Apply the environment variables understood by the launcher.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(platform) = platform_override(&lookup) {
            self.platform = platform;
        }
        self.bun_detected = bun_detected(&lookup);
        self
    }
}

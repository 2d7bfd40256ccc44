//! Host platform identification and the static target tables.
//!
//! The shim ships one prebuilt executable per platform. A [`PlatformKey`]
//! (operating system + CPU architecture, spelled the way Node.js spells them)
//! selects both the Rust target triple used in the release archive name and
//! the canonical filename the executable is installed under.
//!
//! # Example
//!
//! ```
//! use shim_schema::{PlatformKey, resolve};
//!
//! let key = PlatformKey::new("darwin", "arm64");
//! let target = resolve(&key).unwrap();
//! assert_eq!(target.triple, "aarch64-apple-darwin");
//! assert_eq!(target.asset_name, "agent-desktop-darwin-arm64");
//! ```

use crate::REPOSITORY_URL;

/// Operating systems the shim currently installs and launches on.
///
/// The target table below also lists Linux and Windows so they can be enabled
/// by extending this list once those builds are published.
pub const SUPPORTED_OS: &[&str] = &["darwin"];

/// One row of the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetRow {
    os: &'static str,
    arch: &'static str,
    triple: &'static str,
    asset_name: &'static str,
}

const TARGETS: &[TargetRow] = &[
    TargetRow {
        os: "darwin",
        arch: "arm64",
        triple: "aarch64-apple-darwin",
        asset_name: "agent-desktop-darwin-arm64",
    },
    TargetRow {
        os: "darwin",
        arch: "x64",
        triple: "x86_64-apple-darwin",
        asset_name: "agent-desktop-darwin-x64",
    },
    TargetRow {
        os: "linux",
        arch: "x64",
        triple: "x86_64-unknown-linux-gnu",
        asset_name: "agent-desktop-linux-x64",
    },
    TargetRow {
        os: "linux",
        arch: "arm64",
        triple: "aarch64-unknown-linux-gnu",
        asset_name: "agent-desktop-linux-arm64",
    },
    TargetRow {
        os: "win32",
        arch: "x64",
        triple: "x86_64-pc-windows-msvc",
        asset_name: "agent-desktop-win32-x64.exe",
    },
];

/// Operating system and CPU architecture of a host, in Node.js naming.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlatformKey {
    /// `darwin`, `linux`, `win32`, or whatever the host reports.
    pub os: String,
    /// `arm64`, `x64`, or whatever the host reports.
    pub arch: String,
}

impl PlatformKey {
    /// Build a key from explicit identifiers.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Key for the running host.
    pub fn current() -> Self {
        Self::from_rust_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Translate Rust's `std::env::consts` names into Node.js names.
    ///
    /// Unknown names pass through unchanged so that error messages show
    /// exactly what the host reported.
    pub fn from_rust_consts(os: &str, arch: &str) -> Self {
        let os = match os {
            "macos" => "darwin",
            "windows" => "win32",
            other => other,
        };
        let arch = match arch {
            "aarch64" => "arm64",
            "x86_64" => "x64",
            "x86" => "ia32",
            other => other,
        };
        Self::new(os, arch)
    }

    /// Whether the operating system is enabled by [`SUPPORTED_OS`].
    pub fn os_supported(&self) -> bool {
        SUPPORTED_OS.contains(&self.os.as_str())
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl std::str::FromStr for PlatformKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self::new(os, arch)),
            _ => Err(format!("Invalid platform key '{s}', expected <os>-<arch>")),
        }
    }
}

/// A resolved platform: which archive to fetch and what to call the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    /// The key this target was resolved from.
    pub key: PlatformKey,
    /// Rust target triple embedded in the release archive name.
    pub triple: &'static str,
    /// Canonical, version-independent filename of the installed executable.
    pub asset_name: &'static str,
}

/// Why a platform cannot be served.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unsupported {
    /// The operating system is not enabled yet.
    #[error("{os} is not supported yet (platform {key})")]
    OsNotYetSupported {
        /// Reported operating system.
        os: String,
        /// Full platform key.
        key: PlatformKey,
    },

    /// The operating system is supported but the CPU architecture is unknown.
    #[error("Unsupported architecture: {key}")]
    UnknownArchitecture {
        /// Full platform key.
        key: PlatformKey,
    },
}

impl Unsupported {
    /// The platform key that failed to resolve.
    pub fn key(&self) -> &PlatformKey {
        match self {
            Self::OsNotYetSupported { key, .. } | Self::UnknownArchitecture { key } => key,
        }
    }

    /// Human-readable remediation, one line per entry.
    pub fn help_lines(&self) -> Vec<String> {
        match self {
            Self::OsNotYetSupported { os, .. } => vec![
                "agent-desktop currently supports macOS only (ARM64, x64).".to_string(),
                format!("{os} support is coming in Phase 2."),
                format!("See: {REPOSITORY_URL}"),
            ],
            Self::UnknownArchitecture { key } => vec![
                format!("No prebuilt binary exists for {key}."),
                "agent-desktop currently supports: macOS (ARM64, x64)".to_string(),
                format!("See: {REPOSITORY_URL}"),
            ],
        }
    }
}

/// Look up the raw table entry for a key, ignoring the OS gate.
pub fn lookup(key: &PlatformKey) -> Option<(&'static str, &'static str)> {
    TARGETS
        .iter()
        .find(|row| row.os == key.os && row.arch == key.arch)
        .map(|row| (row.triple, row.asset_name))
}

/// Resolve a platform key to its target triple and canonical asset name.
///
/// Installer and launcher both call this, so the filename each computes
/// always agrees.
///
/// # Errors
///
/// Returns [`Unsupported::OsNotYetSupported`] when the operating system is not
/// in [`SUPPORTED_OS`], and [`Unsupported::UnknownArchitecture`] when the OS
/// is supported but no table entry exists for the architecture.
pub fn resolve(key: &PlatformKey) -> Result<TargetSpec, Unsupported> {
    if !key.os_supported() {
        return Err(Unsupported::OsNotYetSupported {
            os: key.os.clone(),
            key: key.clone(),
        });
    }

    let (triple, asset_name) = lookup(key).ok_or_else(|| Unsupported::UnknownArchitecture {
        key: key.clone(),
    })?;

    Ok(TargetSpec {
        key: key.clone(),
        triple,
        asset_name,
    })
}

/// Every platform key listed in the target table.
pub fn known_keys() -> impl Iterator<Item = PlatformKey> {
    TARGETS.iter().map(|row| PlatformKey::new(row.os, row.arch))
}

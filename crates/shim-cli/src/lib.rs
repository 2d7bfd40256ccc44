//! agent-desktop npm shim
#![allow(clippy::missing_errors_doc)]
//!
//! Command-line edges of the distribution shim. The heavy lifting lives in
//! `shim-core`; this crate turns the process environment and flags into
//! explicit configuration and maps outcomes onto exit codes.
//!
//! # Binaries
//!
//! - `agent-desktop`: the launcher. Takes no flags of its own and forwards
//!   every argument to the native executable.
//! - `agent-desktop-postinstall`: the package install hook.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use shim_core::config::{ENV_BIN_DIR, ENV_VERSION};
use shim_core::{InstallConfig, LaunchConfig, PackageMetadata};
use tracing_subscriber::EnvFilter;

/// Install hook flags. Every flag can also be set through the environment.
#[derive(Debug, Parser)]
#[command(name = "agent-desktop-postinstall")]
#[command(version, about = "Download and install the agent-desktop native binary")]
pub struct PostinstallCli {
    /// Root of the installed npm package (holds package.json)
    #[arg(long, env = "AGENT_DESKTOP_PACKAGE_ROOT", default_value = ".")]
    pub package_root: PathBuf,

    /// Directory to install the native binary into [default: <package-root>/bin]
    #[arg(long, env = ENV_BIN_DIR)]
    pub bin_dir: Option<PathBuf>,

    /// Release version to install [default: version in package.json]
    #[arg(long, env = ENV_VERSION)]
    pub release_version: Option<String>,

    /// Wall-clock limit for each download attempt, in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Leave the global npm entry point pointing at the launcher
    #[arg(long)]
    pub no_symlink_optimization: bool,

    /// Exit non-zero when the binary could not be installed
    #[arg(long)]
    pub strict: bool,
}

impl PostinstallCli {
    /// Build the installer configuration from flags and `lookup`
    /// (normally `std::env::var`).
    pub fn install_config<F>(&self, lookup: F) -> Result<InstallConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let package_root = absolute(&self.package_root)?;

        let version = match &self.release_version {
            Some(v) if !v.is_empty() => v.clone(),
            _ => {
                PackageMetadata::load(&package_root)
                    .context("Cannot determine the release version")?
                    .version
            }
        };

        let bin_dir = match &self.bin_dir {
            Some(dir) => absolute(dir)?,
            None => package_root.join("bin"),
        };

        let mut config = InstallConfig::new(version, bin_dir).with_env(lookup);
        config.timeout = Duration::from_secs(self.timeout_secs);
        config.optimize_symlink = !self.no_symlink_optimization;
        Ok(config)
    }
}

/// Launcher configuration: `AGENT_DESKTOP_BIN_DIR` if set, otherwise the
/// directory holding the running executable. `AGENT_DESKTOP_PLATFORM` and the
/// package manager's user agent are honoured as well.
pub fn launch_config<F>(lookup: F) -> Result<LaunchConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let bin_dir = match lookup(ENV_BIN_DIR).filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let exe = std::env::current_exe().context("Cannot locate the running executable")?;
            let exe = std::fs::canonicalize(&exe).unwrap_or(exe);
            exe.parent()
                .map(Path::to_path_buf)
                .context("Running executable has no parent directory")?
        }
    };
    Ok(LaunchConfig::new(bin_dir).with_env(lookup))
}

/// Route `tracing` diagnostics to stderr, filtered by `RUST_LOG`.
///
/// Stdout is never written to: it belongs to the package manager during
/// install and to the native program during launch.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Cannot read the working directory")?;
    Ok(cwd.join(path))
}

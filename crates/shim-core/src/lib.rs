//! Acquisition and launch pipeline for the agent-desktop npm shim.
//!
//! - [`install::Installer`] runs once after the package is placed: resolve the
//!   platform, fetch and verify the release archive, install the executable at
//!   its canonical path and optionally collapse the global entry point.
//! - [`launch::Launcher`] runs on every invocation: locate the executable and
//!   hand the process over to it.
//!
//! All ambient state (environment, working directory, host platform) is read
//! by the binaries and passed in through [`config`] structs.

pub mod config;
pub mod install;
pub mod io;
pub mod launch;
pub mod reporter;
pub mod symlink;

pub use config::{InstallConfig, LaunchConfig, PackageMetadata};
pub use install::{InstallError, InstallOutcome, Installer, Verification};
pub use launch::{LaunchError, Launcher};
pub use reporter::{NullReporter, Reporter, StderrReporter};
pub use symlink::{Optimization, SymlinkOptimizer};

/// User-Agent sent with every download request.
pub fn user_agent(version: &str) -> String {
    format!("{}/{version}", shim_schema::PROGRAM_NAME)
}

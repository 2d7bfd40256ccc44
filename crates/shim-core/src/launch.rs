//! Steady-state entry point: find the installed executable and run it.
//!
//! The launcher never touches the network. Arguments, stdin, stdout and
//! stderr pass straight through to the child, and the child's exit code
//! becomes ours.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use shim_schema::{PROGRAM_NAME, PlatformKey, REPOSITORY_URL, Unsupported};
use thiserror::Error;

use crate::config::LaunchConfig;
use crate::io::{is_executable, make_executable};

/// Exit code used when the executable cannot be located or started.
pub const FAILURE_EXIT_CODE: i32 = 1;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Unsupported platform: {0}")]
    Unsupported(#[from] Unsupported),

    #[error("Native binary not found for {platform}\nExpected: {}", .path.display())]
    MissingAsset {
        platform: PlatformKey,
        path: PathBuf,
        /// Bun skips install hooks unless the package is trusted.
        bun: bool,
    },

    #[error("Cannot make binary executable: {source}")]
    NotExecutable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot execute binary {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Remediation lines to print after the error itself.
    pub fn fix_suggestion(&self) -> Vec<String> {
        match self {
            Self::Unsupported(reason) => reason.help_lines(),
            Self::MissingAsset { bun, .. } => {
                let mut lines = vec![
                    String::new(),
                    "Try reinstalling:".to_string(),
                    format!("  npm install -g {PROGRAM_NAME}"),
                ];
                if *bun {
                    lines.extend([
                        String::new(),
                        "Bun detected: postinstall scripts require --trust:".to_string(),
                        format!("  bun install -g --trust {PROGRAM_NAME}"),
                    ]);
                }
                lines.extend([
                    String::new(),
                    "Or download directly from:".to_string(),
                    format!("  {REPOSITORY_URL}/releases"),
                ]);
                lines
            }
            Self::NotExecutable { path, .. } => {
                vec![format!("Try running: chmod +x {}", path.display())]
            }
            Self::Spawn { .. } => vec![
                "The installed binary may be corrupt.".to_string(),
                format!("Try reinstalling: npm install -g {PROGRAM_NAME}"),
            ],
        }
    }
}

/// Locates and runs the native executable.
#[derive(Debug, Clone)]
pub struct Launcher {
    config: LaunchConfig,
}

impl Launcher {
    pub fn new(config: LaunchConfig) -> Self {
        Self { config }
    }

    /// Canonical path of the executable for the configured platform, made
    /// executable if it was not already.
    pub fn resolve_asset(&self) -> Result<PathBuf, LaunchError> {
        let target = shim_schema::resolve(&self.config.platform)?;
        let path = self.config.bin_dir.join(target.asset_name);

        if !path.is_file() {
            return Err(LaunchError::MissingAsset {
                platform: self.config.platform.clone(),
                path,
                bun: self.config.bun_detected,
            });
        }

        ensure_executable(&path)?;
        Ok(path)
    }

    /// Run the executable with `args` and wait for it.
    ///
    /// Returns the child's exit code, or `0` when it has none (killed by a
    /// signal).
    pub fn launch<I, S>(&self, args: I) -> Result<i32, LaunchError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let path = self.resolve_asset()?;
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        tracing::debug!(path = %path.display(), argc = args.len(), "spawning native binary");

        let status = Command::new(&path)
            .args(&args)
            .status()
            .map_err(|source| LaunchError::Spawn {
                path: path.clone(),
                source,
            })?;

        Ok(status.code().unwrap_or(0))
    }
}

fn ensure_executable(path: &Path) -> Result<(), LaunchError> {
    if cfg!(windows) {
        return Ok(());
    }

    let executable = is_executable(path).map_err(|source| LaunchError::NotExecutable {
        path: path.to_path_buf(),
        source,
    })?;

    if !executable {
        tracing::debug!(path = %path.display(), "setting executable bit");
        make_executable(path).map_err(|source| LaunchError::NotExecutable {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

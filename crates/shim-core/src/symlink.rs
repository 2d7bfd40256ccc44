//! Global entry point optimization.
//!
//! A global npm install registers `<prefix>/bin/agent-desktop` as a symlink to
//! the package's launcher. When that entry is a symlink we repoint it at the
//! native executable directly, which saves one process hop per invocation.
//!
//! This is opportunistic: every failure is reported and swallowed, and an
//! entry that is not a symlink is never touched.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::Reporter;

/// What [`SymlinkOptimizer::optimize_in`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimization {
    /// The entry now points at the native executable.
    Relinked,
    /// The entry already pointed at the native executable.
    AlreadyDirect,
    /// No global bin directory, no entry, or the entry is not a symlink.
    NotApplicable,
    /// Relinking failed; the previous entry is still in place.
    Failed(String),
}

/// Locate npm's global bin directory via `npm prefix -g`.
///
/// Returns `None` on Windows, when npm is not on `PATH`, or when the query
/// fails for any reason.
pub fn global_bin_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        return None;
    }

    let npm = which::which("npm").ok()?;
    let output = Command::new(npm).args(["prefix", "-g"]).output().ok()?;
    if !output.status.success() {
        tracing::debug!(status = ?output.status, "npm prefix -g failed");
        return None;
    }

    let prefix = String::from_utf8(output.stdout).ok()?;
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return None;
    }
    Some(Path::new(prefix).join("bin"))
}

/// Repoints a global entry point symlink at the installed executable.
#[derive(Debug, Clone)]
pub struct SymlinkOptimizer {
    entry_name: String,
    target: PathBuf,
}

impl SymlinkOptimizer {
    /// `entry_name` is the file name inside the global bin directory,
    /// `target` the installed executable.
    pub fn new(entry_name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            entry_name: entry_name.into(),
            target: target.into(),
        }
    }

    /// Query npm for the global bin directory and optimize the entry there.
    pub fn optimize<R: Reporter + ?Sized>(&self, reporter: &R) -> Optimization {
        match global_bin_dir() {
            Some(dir) => self.optimize_in(&dir, reporter),
            None => Optimization::NotApplicable,
        }
    }

    /// Optimize `bin_dir/<entry_name>`.
    pub fn optimize_in<R>(&self, bin_dir: &Path, reporter: &R) -> Optimization
    where
        R: Reporter + ?Sized,
    {
        let entry = bin_dir.join(&self.entry_name);

        match std::fs::symlink_metadata(&entry) {
            Ok(meta) if meta.file_type().is_symlink() => {}
            _ => return Optimization::NotApplicable,
        }

        if std::fs::read_link(&entry).is_ok_and(|current| current == self.target) {
            return Optimization::AlreadyDirect;
        }

        match relink(&entry, &self.target) {
            Ok(()) => {
                reporter.success("Optimized: symlink points to native binary (zero overhead)");
                Optimization::Relinked
            }
            Err(e) => {
                reporter.warning(&format!("Could not optimize symlink: {e}"));
                reporter.info("CLI will work via the launcher (slightly slower startup)");
                Optimization::Failed(e.to_string())
            }
        }
    }
}

/// Create the new link beside `entry` and rename it over `entry`, so the
/// entry point is replaced in one step and never missing.
#[cfg(unix)]
fn relink(entry: &Path, target: &Path) -> std::io::Result<()> {
    let parent = entry.parent().unwrap_or_else(|| Path::new("."));
    let name = entry
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staged = parent.join(format!(".{name}.{}.relink", std::process::id()));

    crate::io::remove_if_exists(&staged)?;
    std::os::unix::fs::symlink(target, &staged)?;

    if let Err(e) = std::fs::rename(&staged, entry) {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }
    Ok(())
}

#[cfg(not(unix))]
fn relink(_entry: &Path, _target: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "symlink optimization is unix-only",
    ))
}

//! Post-install acquisition of the native executable.
//!
//! # Implementation Note: Install Pipeline
//!
//! ```text
//! skip? → resolve platform → override? → already installed? →
//! download archive → download manifest → verify → extract → relocate →
//! chmod → clean up → optimize global symlink
//! ```
//!
//! Only an integrity failure stops the pipeline without installing; every
//! other failure after the archive download degrades to a logged
//! [`InstallOutcome::Degraded`] with manual recovery instructions. None of the
//! outcomes fail the surrounding package installation unless the caller asks
//! for strict exit codes.

mod error;

pub use error::InstallError;

use std::path::{Path, PathBuf};

use shim_schema::release::{ARCHIVE_ENTRY_NAME, MANIFEST_NAME};
use shim_schema::{
    ChecksumManifest, PROGRAM_NAME, ReleaseAsset, Sha256Digest, TargetSpec, Unsupported,
};

use crate::Reporter;
use crate::config::{ENV_BINARY_PATH, ENV_SKIP_DOWNLOAD, InstallConfig};
use crate::io::download::{DownloadOptions, Downloader};
use crate::io::extract::extract_tar_gz;
use crate::io::retry::retry_with_backoff;
use crate::io::verify::{DigestCheck, verify_file};
use crate::io::{make_executable, remove_if_exists, tmp_sibling};
use crate::symlink::{Optimization, SymlinkOptimizer};

/// Whether the downloaded archive was checked against the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The archive digest matched its manifest entry.
    Verified,
    /// No manifest, or no entry for this archive; installed unverified.
    Skipped(String),
}

/// Terminal state of one installer run.
#[derive(Debug)]
pub enum InstallOutcome {
    /// Acquisition disabled by the environment.
    Skipped,
    /// No executable exists for this platform.
    Unsupported(Unsupported),
    /// A user-supplied executable was copied into place.
    OverrideInstalled {
        path: PathBuf,
        optimization: Optimization,
    },
    /// The canonical path was already populated; nothing was downloaded.
    AlreadyInstalled {
        path: PathBuf,
        optimization: Optimization,
    },
    /// Freshly downloaded and installed.
    Installed {
        path: PathBuf,
        verification: Verification,
        optimization: Optimization,
    },
    /// The archive did not match its published digest and was discarded.
    ///
    /// `expected` is the manifest's digest field verbatim, which may itself be
    /// malformed.
    IntegrityFailure {
        expected: String,
        actual: Sha256Digest,
    },
    /// Acquisition failed; the package works once the binary is placed manually.
    Degraded { error: InstallError },
}

impl InstallOutcome {
    /// Whether a usable executable is at the canonical path.
    pub fn is_installed(&self) -> bool {
        matches!(
            self,
            Self::OverrideInstalled { .. } | Self::AlreadyInstalled { .. } | Self::Installed { .. }
        )
    }

    /// Process exit code for the install hook.
    ///
    /// Always `0` unless `strict`, in which case failed acquisitions map to `1`.
    pub fn exit_code(&self, strict: bool) -> i32 {
        match self {
            Self::IntegrityFailure { .. } | Self::Degraded { .. } if strict => 1,
            _ => 0,
        }
    }
}

/// Intermediate files in the bin directory for one download.
#[derive(Debug)]
struct Staging {
    archive: PathBuf,
    manifest: PathBuf,
}

impl Staging {
    fn new(bin_dir: &Path, asset: &ReleaseAsset) -> Self {
        Self {
            archive: bin_dir.join(&asset.archive_name),
            manifest: bin_dir.join(MANIFEST_NAME),
        }
    }

    fn remove_manifest(&self) {
        for path in [tmp_sibling(&self.manifest), self.manifest.clone()] {
            if let Err(e) = remove_if_exists(&path) {
                tracing::debug!(path = %path.display(), "cleanup failed: {e}");
            }
        }
    }

    fn cleanup(&self) {
        for path in [tmp_sibling(&self.archive), self.archive.clone()] {
            if let Err(e) = remove_if_exists(&path) {
                tracing::debug!(path = %path.display(), "cleanup failed: {e}");
            }
        }
        self.remove_manifest();
    }
}

enum Integrity {
    Verified,
    Skipped(String),
    Mismatch {
        expected: String,
        actual: Sha256Digest,
    },
}

enum Acquired {
    Installed(Verification),
    Corrupt {
        expected: String,
        actual: Sha256Digest,
    },
}

/// Runs the install pipeline for one configuration.
#[derive(Debug)]
pub struct Installer<R: Reporter> {
    config: InstallConfig,
    reporter: R,
}

impl<R: Reporter> Installer<R> {
    pub fn new(config: InstallConfig, reporter: R) -> Self {
        Self { config, reporter }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    /// Run the pipeline to completion. Never panics, never returns an error:
    /// every failure is folded into the returned outcome.
    pub async fn run(&self) -> InstallOutcome {
        let r = &self.reporter;

        if self.config.skip_download {
            r.info(&format!("Skipping binary download ({ENV_SKIP_DOWNLOAD} is set)"));
            return InstallOutcome::Skipped;
        }

        let target = match shim_schema::resolve(&self.config.platform) {
            Ok(target) => target,
            Err(reason) => {
                r.warning(&reason.to_string());
                for line in reason.help_lines() {
                    r.info(&line);
                }
                return InstallOutcome::Unsupported(reason);
            }
        };

        let canonical = self.config.bin_dir.join(target.asset_name);

        if let Some(source) = &self.config.binary_override {
            if source.is_file() {
                match install_override(source, &canonical) {
                    Ok(()) => {
                        r.info(&format!(
                            "Using binary from {ENV_BINARY_PATH}: {}",
                            source.display()
                        ));
                        let optimization = self.optimize(&canonical);
                        return InstallOutcome::OverrideInstalled {
                            path: canonical,
                            optimization,
                        };
                    }
                    Err(e) => {
                        r.warning(&format!("Failed to copy from {ENV_BINARY_PATH}: {e}"));
                    }
                }
            } else {
                r.warning(&format!(
                    "{ENV_BINARY_PATH} not found: {}",
                    source.display()
                ));
            }
        }

        if canonical.is_file() {
            if let Err(e) = make_executable(&canonical) {
                r.warning(&format!(
                    "Could not set executable permission on {}: {e}",
                    canonical.display()
                ));
            }
            r.info(&format!("Native binary ready: {}", target.asset_name));
            let optimization = self.optimize(&canonical);
            return InstallOutcome::AlreadyInstalled {
                path: canonical,
                optimization,
            };
        }

        let asset = ReleaseAsset::new(&self.config.download_base, &self.config.version, &target);
        let staging = Staging::new(&self.config.bin_dir, &asset);

        r.info(&format!("Downloading native binary for {}...", target.key));
        if let Some(proxy) = &self.config.proxy {
            r.info(&format!("Using proxy: {proxy}"));
        }

        match self.acquire(&asset, &target, &canonical, &staging).await {
            Ok(Acquired::Installed(verification)) => {
                r.success(&format!("Installed native binary: {}", target.asset_name));
                let optimization = self.optimize(&canonical);
                InstallOutcome::Installed {
                    path: canonical,
                    verification,
                    optimization,
                }
            }
            Ok(Acquired::Corrupt { expected, actual }) => {
                InstallOutcome::IntegrityFailure { expected, actual }
            }
            Err(error) => {
                r.error(&format!("Could not download native binary: {error}"));
                r.info("");
                r.info("You can download manually from:");
                r.info(&format!("  {}", asset.archive_url));
                r.info("");
                r.info(&format!("Then place the binary at: {}", canonical.display()));
                staging.cleanup();
                InstallOutcome::Degraded { error }
            }
        }
    }

    /// Download, verify, extract and place the executable.
    async fn acquire(
        &self,
        asset: &ReleaseAsset,
        target: &TargetSpec,
        canonical: &Path,
        staging: &Staging,
    ) -> Result<Acquired, InstallError> {
        let r = &self.reporter;

        tokio::fs::create_dir_all(&self.config.bin_dir)
            .await
            .map_err(InstallError::io("Failed to create bin directory"))?;

        let downloader = Downloader::new(DownloadOptions {
            timeout: self.config.timeout,
            max_redirects: self.config.max_redirects,
            user_agent: crate::user_agent(&self.config.version),
        })?;

        retry_with_backoff(&self.config.retry, r, |_| {
            downloader.fetch(&asset.archive_url, &staging.archive)
        })
        .await?;
        r.info(&format!("Downloaded: {}", asset.archive_name));

        let verification = match self.check_integrity(&downloader, asset, staging).await {
            Integrity::Verified => Verification::Verified,
            Integrity::Skipped(reason) => Verification::Skipped(reason),
            Integrity::Mismatch { expected, actual } => {
                r.warning("WARNING: Checksum verification failed. Binary may be corrupted.");
                r.info(&format!("Expected {expected}, got {actual}"));
                r.info(&format!("Try reinstalling: npm install -g {PROGRAM_NAME}"));
                staging.cleanup();
                return Ok(Acquired::Corrupt { expected, actual });
            }
        };

        tracing::debug!(triple = target.triple, "extracting archive");
        self.unpack(&staging.archive, canonical).await?;

        if let Err(e) = make_executable(canonical) {
            r.warning(&format!(
                "Could not set executable permission on {}: {e}",
                canonical.display()
            ));
        }

        staging.cleanup();
        Ok(Acquired::Installed(verification))
    }

    /// Fetch the manifest and compare the archive digest against it.
    ///
    /// Only a successful comparison that disagrees is a hard failure; every
    /// way of not being able to compare degrades to [`Integrity::Skipped`].
    async fn check_integrity(
        &self,
        downloader: &Downloader,
        asset: &ReleaseAsset,
        staging: &Staging,
    ) -> Integrity {
        let r = &self.reporter;

        let fetched = retry_with_backoff(&self.config.retry, r, |_| {
            downloader.fetch(&asset.manifest_url, &staging.manifest)
        })
        .await;
        if let Err(e) = fetched {
            r.warning(&format!("Could not verify checksum: {e}"));
            staging.remove_manifest();
            return Integrity::Skipped(e.to_string());
        }

        let text = match tokio::fs::read_to_string(&staging.manifest).await {
            Ok(text) => text,
            Err(e) => {
                r.warning(&format!("Could not verify checksum: {e}"));
                staging.remove_manifest();
                return Integrity::Skipped(e.to_string());
            }
        };

        let manifest = ChecksumManifest::parse(&text);
        let Some(entry) = manifest.expected_for(&asset.archive_name).cloned() else {
            let reason = format!("no entry for {} in {MANIFEST_NAME}", asset.archive_name);
            r.warning(&format!("Checksum not verified: {reason}"));
            staging.remove_manifest();
            return Integrity::Skipped(reason);
        };

        if let Err(e) = &entry.digest {
            r.warning(&format!(
                "Checksum entry for {} in {MANIFEST_NAME} is unusable: {e}",
                asset.archive_name
            ));
        }

        let archive = staging.archive.clone();
        let checked =
            tokio::task::spawn_blocking(move || verify_file(&archive, &entry)).await;

        match checked {
            Ok(Ok(DigestCheck::Match)) => {
                r.success("Checksum verified");
                staging.remove_manifest();
                Integrity::Verified
            }
            Ok(Ok(DigestCheck::Mismatch { expected, actual })) => {
                Integrity::Mismatch { expected, actual }
            }
            Ok(Err(e)) => {
                r.warning(&format!("Could not verify checksum: {e}"));
                staging.remove_manifest();
                Integrity::Skipped(e.to_string())
            }
            Err(e) => {
                r.warning(&format!("Could not verify checksum: {e}"));
                staging.remove_manifest();
                Integrity::Skipped(e.to_string())
            }
        }
    }

    /// Extract into a private staging directory and move the executable
    /// onto its canonical name.
    async fn unpack(&self, archive: &Path, canonical: &Path) -> Result<(), InstallError> {
        let archive = archive.to_path_buf();
        let canonical = canonical.to_path_buf();
        let bin_dir = self.config.bin_dir.clone();

        tokio::task::spawn_blocking(move || {
            let scratch = tempfile::Builder::new()
                .prefix(".extract-")
                .tempdir_in(&bin_dir)
                .map_err(InstallError::io("Failed to create staging directory"))?;

            let files = extract_tar_gz(&archive, scratch.path())?;

            let top_level = Path::new(ARCHIVE_ENTRY_NAME);
            let entry = files
                .iter()
                .find(|f| f.relative_path == top_level)
                .or_else(|| {
                    files
                        .iter()
                        .find(|f| f.relative_path.file_name() == top_level.file_name())
                })
                .ok_or(InstallError::MissingEntry {
                    entry: ARCHIVE_ENTRY_NAME,
                })?;

            std::fs::rename(&entry.absolute_path, &canonical)
                .map_err(InstallError::io("Failed to move executable into place"))?;
            Ok(())
        })
        .await
        .map_err(|e| InstallError::Task(e.to_string()))?
    }

    fn optimize(&self, canonical: &Path) -> Optimization {
        if !self.config.optimize_symlink {
            return Optimization::NotApplicable;
        }

        let target = std::fs::canonicalize(canonical).unwrap_or_else(|_| canonical.to_path_buf());
        let optimizer = SymlinkOptimizer::new(PROGRAM_NAME, target);
        match &self.config.global_bin_dir {
            Some(dir) => optimizer.optimize_in(dir, &self.reporter),
            None => optimizer.optimize(&self.reporter),
        }
    }
}

/// Copy a trusted local executable onto the canonical path.
fn install_override(source: &Path, canonical: &Path) -> std::io::Result<()> {
    if let Some(parent) = canonical.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = tmp_sibling(canonical);
    let result = std::fs::copy(source, &tmp)
        .and_then(|_| make_executable(&tmp))
        .and_then(|()| std::fs::rename(&tmp, canonical));

    if result.is_err() {
        let _ = remove_if_exists(&tmp);
    }
    result
}

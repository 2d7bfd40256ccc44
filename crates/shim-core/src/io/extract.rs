//! Archive extraction module
//!
//! Release archives are gzip-compressed tarballs.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid path in archive: {0}")]
    UnsafePath(PathBuf),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;

        if entry.header().entry_type().is_dir() {
            continue;
        }

        let relative_path: PathBuf = entry.path()?.components().collect();

        // Reject absolute paths and `..` so nothing lands outside dest_dir
        if relative_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ExtractError::UnsafePath(relative_path));
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&absolute_path)?;

        tracing::debug!(path = %relative_path.display(), "extracted");

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
        });
    }

    Ok(extracted_files)
}

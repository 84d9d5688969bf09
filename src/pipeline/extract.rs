//! Archive extraction into a run-scoped scratch workspace.
//!
//! The archive format is detected from its magic bytes, not its extension:
//! plenty of `.cbr` files in the wild are really ZIP containers and vice
//! versa. ZIP-family archives (`.cbz`) are unpacked with the `zip` crate,
//! TAR archives (`.cbt`) with `tar`, RAR-family archives (`.cbr`) with
//! `unrar` behind the `rar` feature, and 7z archives (`.cb7`) with
//! `sevenz-rust` behind the `sevenz` feature.
//!
//! [`ScratchWorkspace`] wraps a [`TempDir`], so the extracted tree is removed
//! when the workspace is dropped, on the success path and on every error
//! path alike.

use crate::error::Cbr2PdfError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Unpacks an archive into an existing directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every entry of `archive` below `destination`.
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError>;
}

/// Container formats recognised by [`DefaultExtractor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.cbz` / `.zip`
    Zip,
    /// `.cbr` / `.rar`
    Rar,
    /// `.cbt` / `.tar`
    Tar,
    /// `.cb7` / `.7z`
    SevenZip,
}

const ZIP_MAGICS: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";
const SEVEN_ZIP_MAGIC: &[u8] = b"7z\xbc\xaf\x27\x1c";
/// POSIX and GNU tar both carry `ustar` in the first header block.
const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;
/// Leading bytes echoed in `UnsupportedArchive`.
const REPORTED_MAGIC_LEN: usize = 8;

/// Classify a file by its leading bytes.
pub fn detect_kind(path: &Path) -> Result<ArchiveKind, Cbr2PdfError> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Cbr2PdfError::ArchiveNotFound {
            path: path.to_path_buf(),
        },
        _ => Cbr2PdfError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    let mut head = Vec::with_capacity(TAR_MAGIC_OFFSET + TAR_MAGIC.len());
    file.by_ref()
        .take((TAR_MAGIC_OFFSET + TAR_MAGIC.len()) as u64)
        .read_to_end(&mut head)
        .map_err(|e| Cbr2PdfError::ExtractionFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    if ZIP_MAGICS.iter().any(|m| head.starts_with(m)) {
        Ok(ArchiveKind::Zip)
    } else if head.starts_with(RAR_MAGIC) {
        Ok(ArchiveKind::Rar)
    } else if head.starts_with(SEVEN_ZIP_MAGIC) {
        Ok(ArchiveKind::SevenZip)
    } else if head.get(TAR_MAGIC_OFFSET..) == Some(TAR_MAGIC) {
        Ok(ArchiveKind::Tar)
    } else {
        head.truncate(REPORTED_MAGIC_LEN);
        Err(Cbr2PdfError::UnsupportedArchive {
            path: path.to_path_buf(),
            magic: head,
        })
    }
}

/// Production extractor: ZIP via `zip`, TAR via `tar`, RAR via `unrar`,
/// 7z via `sevenz-rust`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl ArchiveExtractor for DefaultExtractor {
    fn extract(&self, archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
        let kind = detect_kind(archive)?;
        debug!("Detected {:?} archive: {}", kind, archive.display());
        match kind {
            ArchiveKind::Zip => extract_zip(archive, destination),
            ArchiveKind::Rar => extract_rar(archive, destination),
            ArchiveKind::Tar => extract_tar(archive, destination),
            ArchiveKind::SevenZip => extract_seven_zip(archive, destination),
        }
    }
}

fn extraction_failed(path: &Path, detail: impl std::fmt::Display) -> Cbr2PdfError {
    Cbr2PdfError::ExtractionFailed {
        path: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

fn extract_zip(archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
    let file = File::open(archive).map_err(|e| extraction_failed(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction_failed(archive, e))?;
    info!("Extracting {} entries from {}", zip.len(), archive.display());
    zip.extract(destination)
        .map_err(|e| extraction_failed(archive, e))
}

fn extract_tar(archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
    let file = File::open(archive).map_err(|e| extraction_failed(archive, e))?;
    let mut tar = tar::Archive::new(file);
    tar.unpack(destination)
        .map_err(|e| extraction_failed(archive, e))?;
    info!("Extracted tar archive {}", archive.display());
    Ok(())
}

#[cfg(feature = "sevenz")]
fn extract_seven_zip(archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
    sevenz_rust::decompress_file(archive, destination)
        .map_err(|e| extraction_failed(archive, e))?;
    info!("Extracted 7z archive {}", archive.display());
    Ok(())
}

#[cfg(not(feature = "sevenz"))]
fn extract_seven_zip(archive: &Path, _destination: &Path) -> Result<(), Cbr2PdfError> {
    Err(extraction_failed(
        archive,
        "7z support is not compiled in (rebuild with the `sevenz` feature)",
    ))
}

#[cfg(feature = "rar")]
fn extract_rar(archive: &Path, destination: &Path) -> Result<(), Cbr2PdfError> {
    let mut open = unrar::Archive::new(archive)
        .open_for_processing()
        .map_err(|e| extraction_failed(archive, e))?;
    let mut entries = 0usize;
    while let Some(header) = open.read_header().map_err(|e| extraction_failed(archive, e))? {
        open = if header.entry().is_file() {
            entries += 1;
            header
                .extract_with_base(destination)
                .map_err(|e| extraction_failed(archive, e))?
        } else {
            header.skip().map_err(|e| extraction_failed(archive, e))?
        };
    }
    info!("Extracted {} entries from {}", entries, archive.display());
    Ok(())
}

#[cfg(not(feature = "rar"))]
fn extract_rar(archive: &Path, _destination: &Path) -> Result<(), Cbr2PdfError> {
    Err(extraction_failed(
        archive,
        "RAR support is not compiled in (rebuild with the `rar` feature)",
    ))
}

// ── Scratch workspace ────────────────────────────────────────────────────

/// A temporary directory exclusively owned by one conversion run.
///
/// The directory and everything extracted into it is deleted when the value
/// is dropped or [`ScratchWorkspace::close`]d.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a fresh workspace under `root` (or the system temp dir).
    ///
    /// The directory name starts with the source file name, which makes a
    /// leftover workspace after a killed run easy to attribute.
    pub fn create(root: Option<&Path>, source: &Path) -> Result<Self, Cbr2PdfError> {
        let stem = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cbr2pdf".to_string());
        let prefix = format!("{stem}.");

        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|source| Cbr2PdfError::ScratchUnavailable { source })?;

        debug!("Scratch workspace: {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the workspace now, logging instead of failing if removal
    /// does not succeed.
    pub fn close(self) {
        let path: PathBuf = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!("Failed to remove scratch workspace {}: {}", path.display(), e);
        } else {
            debug!("Removed scratch workspace {}", path.display());
        }
    }
}

//! Image discovery: walk the extracted tree and put pages in reading order.
//!
//! Comic archives carry no page index; the file names *are* the order. The
//! default ordering is a case-insensitive comparison of the full path, which
//! matches reading order whenever names are zero-padded (`002.jpg` <
//! `010.jpg`) and sorts directories (`ch1/`, `ch2/`) before their contents'
//! successors. [`PageOrder::Natural`] is available for archives with
//! unpadded numbers.

use crate::config::PageOrder;
use crate::error::Cbr2PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File extensions (lower-case, without the dot) treated as pages.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One page's source image and its 0-based position in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    pub index: usize,
    pub path: PathBuf,
}

impl ImageReference {
    /// 1-indexed page number, as shown to users.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }
}

/// `true` if `path` has one of the [`SUPPORTED_EXTENSIONS`], ignoring case.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Recursively collect supported images under `root`, ordered by `order`.
///
/// Any traversal error aborts the whole operation. An empty result is not
/// an error here; the caller decides what zero pages means.
pub fn locate_images(root: &Path, order: PageOrder) -> Result<Vec<ImageReference>, Cbr2PdfError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|source| Cbr2PdfError::LocateFailed {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            paths.push(entry.into_path());
        }
    }

    paths.sort_by(|a, b| compare_paths(a, b, order));
    debug!("Located {} images under {}", paths.len(), root.display());

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| ImageReference { index, path })
        .collect())
}

/// Total order over page paths.
///
/// Paths that differ only in case are tie-broken on their raw bytes so the
/// result never depends on traversal order.
pub fn compare_paths(a: &Path, b: &Path, order: PageOrder) -> Ordering {
    let la = a.to_string_lossy().to_lowercase();
    let lb = b.to_string_lossy().to_lowercase();
    let primary = match order {
        PageOrder::Lexicographic => la.cmp(&lb),
        PageOrder::Natural => natural_cmp(&la, &lb).then_with(|| la.cmp(&lb)),
    };
    primary.then_with(|| a.as_os_str().cmp(b.as_os_str()))
}

static RE_CHUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+|\D+").unwrap());

/// Compare two strings chunk by chunk, treating digit runs as numbers.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ca = RE_CHUNK.find_iter(a).map(|m| m.as_str());
    let mut cb = RE_CHUNK.find_iter(b).map(|m| m.as_str());
    loop {
        match (ca.next(), cb.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = if is_digits(x) && is_digits(y) {
                    cmp_numeric(x, y)
                } else {
                    x.cmp(y)
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

/// Numeric comparison of arbitrarily long digit strings.
fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}

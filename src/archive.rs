//! Payload packaging: filesystem paths ⇄ `.tar.zst` bytes.
//!
//! ```no_run
//! use qcarrier::archive::{pack_archive, unpack_archive, PackOptions};
//!
//! let opts = PackOptions::with_candidates(["notes", "config.toml"]);
//! let bytes = pack_archive(&opts)?;
//! if !bytes.is_empty() {
//!     let report = unpack_archive(&bytes, Some("restored".as_ref()))?;
//!     println!("{} entries in {}", report.extracted, report.destination.display());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The container is an ordinary zstd-compressed tar stream; nothing in it is
//! interpreted here beyond entry paths and types.
//!
//! # Extraction safety
//! Entry paths must be relative and free of `..`.  The first entry that is not
//! stops extraction with [`ArchiveError::UnsafeEntry`]; entries written before
//! it stay inside the destination.  Symlink and hard-link entries are never
//! materialized; they are listed in [`UnpackReport::skipped`].

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive stream is empty")]
    Empty,
    #[error("Corrupt archive: {0}")]
    Corrupt(String),
    #[error("Unsafe entry path: {}", .0.display())]
    UnsafeEntry(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn corrupt(e: io::Error) -> ArchiveError {
    ArchiveError::Corrupt(e.to_string())
}

// ── PackOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`pack_archive`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Paths to include if they exist.  Each lands in the archive under its
    /// final path component; a repeated component gets a `-1`, `-2`, ...
    /// suffix before the extension.
    pub candidates: Vec<PathBuf>,
    pub level:      i32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            level:      DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl PackOptions {
    pub fn with_candidates<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            candidates: paths.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

// ── Pack ─────────────────────────────────────────────────────────────────────

fn entry_name(path: &Path) -> io::Result<PathBuf> {
    if let Some(name) = path.file_name() {
        return Ok(PathBuf::from(name));
    }
    // `.` / `..` / trailing `..` have no file name of their own.
    let resolved = fs::canonicalize(path)?;
    resolved
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput,
            format!("cannot name archive entry for {}", path.display())))
}

/// `name` itself if unused, otherwise the first free `stem-N[.ext]`.
fn unique_name(name: PathBuf, used: &mut HashSet<PathBuf>) -> PathBuf {
    if used.insert(name.clone()) {
        return name;
    }
    let stem = name.file_stem().map(OsString::from).unwrap_or_default();
    let ext = name.extension().map(OsString::from);
    let mut n = 1usize;
    loop {
        let mut candidate = stem.clone();
        candidate.push(format!("-{n}"));
        if let Some(ext) = &ext {
            candidate.push(".");
            candidate.push(ext);
        }
        let candidate = PathBuf::from(candidate);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Pack every existing candidate into a `.tar.zst` byte stream.
///
/// Returns an empty `Vec` when none of the candidates exist.  Candidates that
/// share a final component never overwrite each other; see
/// [`PackOptions::candidates`].
pub fn pack_archive(options: &PackOptions) -> Result<Vec<u8>, ArchiveError> {
    let present: Vec<&PathBuf> = options
        .candidates
        .iter()
        .filter(|p| {
            let exists = fs::symlink_metadata(p).is_ok();
            if !exists {
                debug!(path = %p.display(), "candidate missing, skipped");
            }
            exists
        })
        .collect();
    if present.is_empty() {
        return Ok(Vec::new());
    }

    let encoder = zstd::Encoder::new(Vec::new(), options.level)?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    let mut used = HashSet::new();
    for path in present {
        let base = entry_name(path)?;
        let name = unique_name(base.clone(), &mut used);
        if name != base {
            warn!(path = %path.display(), entry = %name.display(), "entry name taken, renamed");
        }
        if fs::symlink_metadata(path)?.is_dir() {
            builder.append_dir_all(&name, path)?;
        } else {
            builder.append_path_with_name(path, &name)?;
        }
        debug!(path = %path.display(), entry = %name.display(), "packed");
    }

    let bytes = builder.into_inner()?.finish()?;
    info!(bytes = bytes.len(), "archive packed");
    Ok(bytes)
}

// ── Unpack ───────────────────────────────────────────────────────────────────

/// Outcome of a successful [`unpack_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackReport {
    pub destination: PathBuf,
    /// Entries written (files and directories).
    pub extracted:   usize,
    /// Link entries that were not materialized.
    pub skipped:     Vec<PathBuf>,
}

fn is_contained(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Unpack a `.tar.zst` byte stream into `destination`, or into a fresh kept
/// temporary directory when `None`.
///
/// Failures are logged and returned as [`ArchiveError`]; they never abort
/// the caller.  A temporary directory created for a failed extraction is
/// removed again.
pub fn unpack_archive(data: &[u8], destination: Option<&Path>) -> Result<UnpackReport, ArchiveError> {
    let result = match destination {
        Some(path) => unpack_into(data, path),
        None => unpack_into_temp(data, &std::env::temp_dir()),
    };
    match &result {
        Ok(report) => info!(
            destination = %report.destination.display(),
            extracted = report.extracted,
            skipped = report.skipped.len(),
            "archive extracted"
        ),
        Err(e) => warn!(error = %e, "archive extraction failed"),
    }
    result
}

/// Extract into a new `qcarrier-*` directory under `parent`, kept only if
/// extraction succeeds.
fn unpack_into_temp(data: &[u8], parent: &Path) -> Result<UnpackReport, ArchiveError> {
    if data.is_empty() {
        return Err(ArchiveError::Empty);
    }
    let dir = tempfile::Builder::new().prefix("qcarrier-").tempdir_in(parent)?;
    let report = extract(data, dir.path())?;
    let destination = dir.keep();
    Ok(UnpackReport { destination, ..report })
}

fn unpack_into(data: &[u8], destination: &Path) -> Result<UnpackReport, ArchiveError> {
    if data.is_empty() {
        return Err(ArchiveError::Empty);
    }
    fs::create_dir_all(destination)?;
    extract(data, destination)
}

fn extract(data: &[u8], destination: &Path) -> Result<UnpackReport, ArchiveError> {
    let decoder = zstd::Decoder::new(data).map_err(corrupt)?;
    let mut archive = tar::Archive::new(decoder);
    let mut report = UnpackReport {
        destination: destination.to_path_buf(),
        extracted:   0,
        skipped:     Vec::new(),
    };

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let path = entry.path().map_err(corrupt)?.into_owned();
        if !is_contained(&path) {
            return Err(ArchiveError::UnsafeEntry(path));
        }

        let kind = entry.header().entry_type();
        if kind.is_symlink() || kind.is_hard_link() {
            warn!(entry = %path.display(), "link entry skipped");
            report.skipped.push(path);
            continue;
        }

        // unpack_in refuses anything that would resolve outside `destination`.
        if !entry.unpack_in(destination)? {
            return Err(ArchiveError::UnsafeEntry(path));
        }
        report.extracted += 1;
    }
    Ok(report)
}

//! Runtime archive extraction.
//!
//! Release archives wrap everything in one top-level directory
//! (`node-v18.17.1-win-x64/...`). Extraction drops that first component so the
//! runtime lands directly in the target directory. Entries that cannot be
//! mapped are skipped and logged; a single bad entry never aborts extraction.

use crate::error::{LaunchpadError, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where an archive entry goes once the top-level directory is stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPath {
    /// Relative path inside the target directory.
    Target(PathBuf),
    /// Nothing left after stripping (the top-level directory itself).
    Empty,
    /// No separator to strip, or a component that would escape the target.
    Unexpected,
}

/// Map a raw entry name to its destination, accepting `/` or `\` separators.
pub fn strip_top_level(name: &str) -> EntryPath {
    let rest = if let Some((_, rest)) = name.split_once('/') {
        rest
    } else if let Some((_, rest)) = name.split_once('\\') {
        rest
    } else {
        return EntryPath::Unexpected;
    };

    let mut path = PathBuf::new();
    for component in rest.split(|c| c == '/' || c == '\\') {
        match component {
            "" | "." => continue,
            ".." => return EntryPath::Unexpected,
            c if c.contains(':') => return EntryPath::Unexpected,
            c => path.push(c),
        }
    }

    if path.as_os_str().is_empty() {
        EntryPath::Empty
    } else {
        EntryPath::Target(path)
    }
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files and directories written.
    pub extracted: usize,
    /// Raw names of entries that were not written.
    pub skipped: Vec<String>,
}

/// Extract a zip archive into `dest`, stripping the top-level directory.
///
/// Only an unreadable archive is an error. Per-entry problems are logged and
/// the entry is recorded in [`ExtractSummary::skipped`].
pub fn extract_stripped(archive_path: &Path, dest: &Path) -> Result<ExtractSummary> {
    let file = File::open(archive_path).map_err(|e| LaunchpadError::FetchFailed {
        message: format!(
            "Failed to open runtime archive {}: {}",
            archive_path.display(),
            e
        ),
    })?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| LaunchpadError::FetchFailed {
        message: format!("Invalid runtime archive: {}", e),
    })?;

    std::fs::create_dir_all(dest).map_err(|e| LaunchpadError::io_with_path(e, dest))?;

    let mut summary = ExtractSummary::default();

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable archive entry {}: {}", i, e);
                summary.skipped.push(format!("#{}", i));
                continue;
            }
        };
        let name = entry.name().to_string();

        let relative = match strip_top_level(&name) {
            EntryPath::Target(path) => path,
            EntryPath::Empty => {
                debug!("Skipping top-level archive entry: {}", name);
                summary.skipped.push(name);
                continue;
            }
            EntryPath::Unexpected => {
                warn!("Skipping archive entry with unexpected path: {}", name);
                summary.skipped.push(name);
                continue;
            }
        };

        let outpath = dest.join(&relative);
        let written = if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
        } else {
            write_entry(&mut entry, &outpath)
        };

        if let Err(e) = written {
            warn!("Failed to extract {}: {}", name, e);
            summary.skipped.push(name);
            continue;
        }

        // Set permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }

        summary.extracted += 1;
    }

    info!(
        "Extracted {} entries to {} ({} skipped)",
        summary.extracted,
        dest.display(),
        summary.skipped.len()
    );
    Ok(summary)
}

fn write_entry(entry: &mut impl std::io::Read, outpath: &Path) -> std::io::Result<()> {
    if let Some(parent) = outpath.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut outfile = File::create(outpath)?;
    std::io::copy(entry, &mut outfile)?;
    Ok(())
}

//! Catalog integrity validation and CLEANUP moves.
//!
//! Before scraping, the catalog is compared against the ROMs actually on
//! disk. Entries whose ROM has vanished are candidates for pruning; their
//! media is moved (never deleted) into the CLEANUP tree:
//! `<media>/CLEANUP/<platform>/<type>/<file>`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::entry::GameEntry;

pub const CLEANUP_DIR: &str = "CLEANUP";

/// Result of comparing catalog entries to scanned ROMs.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub total_entries: usize,
    pub present: usize,
    /// present / total; 1.0 for an empty catalog.
    pub ratio: f64,
    /// Catalog paths whose ROM was not found on disk.
    pub missing_paths: Vec<String>,
}

impl IntegrityReport {
    /// Exactly at the threshold passes; only below fails.
    pub fn passes(&self, threshold: f64) -> bool {
        self.ratio >= threshold
    }
}

/// Compute the presence ratio of catalog entries against the scan results.
///
/// `rom_paths` holds the catalog-relative paths (`./name`) of scanned
/// entities; `rom_stems` their display basenames, used as a fallback so a
/// layout change in the path prefix does not flag everything as missing.
pub fn validate_integrity(
    entries: &[GameEntry],
    rom_paths: &HashSet<String>,
    rom_stems: &HashSet<String>,
) -> IntegrityReport {
    if entries.is_empty() {
        return IntegrityReport {
            total_entries: 0,
            present: 0,
            ratio: 1.0,
            missing_paths: Vec::new(),
        };
    }

    let mut missing_paths = Vec::new();
    for entry in entries {
        let present =
            rom_paths.contains(&entry.path) || rom_stems.contains(&entry.media_stem());
        if !present {
            missing_paths.push(entry.path.clone());
        }
    }

    let total = entries.len();
    let present = total - missing_paths.len();
    IntegrityReport {
        total_entries: total,
        present,
        ratio: present as f64 / total as f64,
        missing_paths,
    }
}

/// Move media files whose stem matches one of `stems` into the CLEANUP
/// tree. Returns the performed (from, to) moves. Always move, never delete.
pub fn move_media_to_cleanup(
    media_root: &Path,
    platform: &str,
    type_dirs: &[&str],
    stems: &HashSet<String>,
) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut moves = Vec::new();
    for type_dir in type_dirs {
        let src_dir = media_root.join(platform).join(type_dir);
        if !src_dir.is_dir() {
            continue;
        }
        let dest_dir = media_root.join(CLEANUP_DIR).join(platform).join(type_dir);
        for dir_entry in std::fs::read_dir(&src_dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if !path.is_file() {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if stems.contains(&stem) {
                std::fs::create_dir_all(&dest_dir)?;
                let dest = dest_dir.join(dir_entry.file_name());
                std::fs::rename(&path, &dest)?;
                log::info!("Moved {} -> {}", path.display(), dest.display());
                moves.push((path, dest));
            }
        }
    }
    Ok(moves)
}

/// Move the entire contents of a now-disabled media type directory into
/// the CLEANUP tree.
pub fn move_type_dir_to_cleanup(
    media_root: &Path,
    platform: &str,
    type_dir: &str,
) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let src_dir = media_root.join(platform).join(type_dir);
    let mut moves = Vec::new();
    if !src_dir.is_dir() {
        return Ok(moves);
    }
    let dest_dir = media_root.join(CLEANUP_DIR).join(platform).join(type_dir);
    for dir_entry in std::fs::read_dir(&src_dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        std::fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(dir_entry.file_name());
        std::fs::rename(&path, &dest)?;
        moves.push((path, dest));
    }
    Ok(moves)
}

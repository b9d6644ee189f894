use std::path::{Path, PathBuf};

use crate::region::{Language, Region};

/// How a ROM entity is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomKind {
    /// A regular file with an accepted extension.
    Single,
    /// An `.m3u` playlist referencing one or more disc files.
    Playlist,
    /// A directory named like a disc file, containing that file
    /// (e.g., `Title (Disc 1).cue/Title (Disc 1).cue`).
    DiscFolder,
}

impl std::fmt::Display for RomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Playlist => write!(f, "playlist"),
            Self::DiscFolder => write!(f, "disc folder"),
        }
    }
}

/// One addressable game discovered in a platform's ROM directory.
///
/// Rebuilt on every run; never persisted. The *primary file* carries the
/// identity: the playlist's disc 1, the disc folder's contained file, or
/// the single file itself.
#[derive(Debug, Clone)]
pub struct RomEntity {
    pub kind: RomKind,
    /// Path of the scanned entry (file, playlist, or directory).
    pub path: PathBuf,
    /// Display basename: filenames for media and catalog keys derive from
    /// this. Playlist stem for playlists; full directory name (extension
    /// kept) for disc folders; file stem otherwise.
    pub basename: String,
    /// Name of the primary file, sent to the Provider on lookups.
    pub query_filename: String,
    /// The file whose bytes define this entity's identity.
    pub primary_file: PathBuf,
    /// Byte length of the primary file.
    pub size: u64,
    /// Uppercase hex content hash of the primary file, when computed.
    pub hash: Option<String>,
    /// Regions declared in the display basename, in source order.
    pub regions: Vec<Region>,
    /// Languages declared in the display basename, in source order.
    pub languages: Vec<Language>,
    /// Other discs (playlist) or other contained files (disc folder).
    pub aux_files: Vec<PathBuf>,
}

impl RomEntity {
    /// The `<path>` value written to the catalog (`./<entry name>`).
    pub fn gamelist_path(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.basename.clone());
        format!("./{name}")
    }

    /// Basename used for media files (same as the display basename).
    pub fn media_basename(&self) -> &str {
        &self.basename
    }

    /// The region list used for Provider preference ordering.
    pub fn top_region(&self) -> Option<Region> {
        self.regions.first().copied()
    }
}

/// Derive a display basename from an entry path for the given kind.
pub fn display_basename(path: &Path, kind: RomKind) -> String {
    match kind {
        // Directory name keeps its extension so media filenames match
        // what the frontend expects for the folder entry.
        RomKind::DiscFolder => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        RomKind::Single | RomKind::Playlist => path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_rules_per_kind() {
        assert_eq!(
            display_basename(Path::new("/roms/psx/Sample Saga.m3u"), RomKind::Playlist),
            "Sample Saga"
        );
        assert_eq!(
            display_basename(
                Path::new("/roms/psx/Demo Orbit (Disc 1).cue"),
                RomKind::DiscFolder
            ),
            "Demo Orbit (Disc 1).cue"
        );
        assert_eq!(
            display_basename(Path::new("/roms/nes/World Explorer (World).zip"), RomKind::Single),
            "World Explorer (World)"
        );
    }
}

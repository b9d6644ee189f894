//! Inventory scanner.
//!
//! Walks one platform's ROM root and classifies each entry as a single
//! file, an `.m3u` playlist, or a disc folder. Broken playlists and
//! invalid disc folders are dropped with a report; a playlist and a disc
//! folder sharing a stem are both dropped (exact-stem comparison only).

use std::collections::HashMap;
use std::path::Path;

use curateur_core::name_parser::parse_name;
use curateur_core::rom::display_basename;
use curateur_core::{Platform, RomEntity, RomKind};

use crate::error::EngineError;

/// One dropped or suspicious entry, reported in the platform summary.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    pub name: String,
    pub detail: String,
}

impl ConflictReport {
    fn new(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: detail.into(),
        }
    }
}

/// Scan result: entities in scan order plus conflict reports.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub roms: Vec<RomEntity>,
    pub conflicts: Vec<ConflictReport>,
}

/// Enumerate a platform's ROM directory.
///
/// A missing ROM directory yields an empty outcome (the platform is
/// simply not installed); an unreadable one is an error.
pub fn scan_platform(platform: &Platform) -> Result<ScanOutcome, EngineError> {
    let mut outcome = ScanOutcome::default();

    if !platform.rom_dir.exists() {
        log::info!(
            "ROM directory not found, skipping platform: {}",
            platform.rom_dir.display()
        );
        return Ok(outcome);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&platform.rom_dir)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for dir_entry in entries {
        let path = dir_entry.path();
        let file_name = dir_entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            continue;
        }
        if !platform.accepts(&file_name) {
            continue;
        }

        let result = if path.is_dir() {
            scan_disc_folder(&path)
        } else if file_name.to_lowercase().ends_with(".m3u") {
            scan_playlist(&path)
        } else {
            scan_single(&path)
        };

        match result {
            Ok(rom) => outcome.roms.push(rom),
            Err(detail) => {
                log::warn!("Skipping {file_name}: {detail}");
                outcome.conflicts.push(ConflictReport::new(file_name, detail));
            }
        }
    }

    drop_playlist_folder_conflicts(&mut outcome);
    drop_duplicate_basenames(&mut outcome);

    log::info!(
        "Scan of {} found {} ROMs ({} conflicts)",
        platform.name,
        outcome.roms.len(),
        outcome.conflicts.len()
    );
    Ok(outcome)
}

fn scan_single(path: &Path) -> Result<RomEntity, String> {
    let size = path
        .metadata()
        .map_err(|e| format!("unreadable file: {e}"))?
        .len();
    let basename = display_basename(path, RomKind::Single);
    let parsed = parse_name(&basename);
    Ok(RomEntity {
        kind: RomKind::Single,
        query_filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        primary_file: path.to_path_buf(),
        path: path.to_path_buf(),
        basename,
        size,
        hash: None,
        regions: parsed.regions,
        languages: parsed.languages,
        aux_files: Vec::new(),
    })
}

/// Parse an `.m3u` playlist: UTF-8 lines, blanks and `#` comments
/// ignored, paths relative to the playlist's directory. Disc 1 is the
/// identity; it must exist.
fn scan_playlist(path: &Path) -> Result<RomEntity, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("unreadable playlist: {e}"))?;
    let content = String::from_utf8_lossy(&bytes);
    let playlist_dir = path.parent().unwrap_or(Path::new("."));

    let mut discs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let disc_path = Path::new(line);
        let disc = if disc_path.is_absolute() {
            disc_path.to_path_buf()
        } else {
            playlist_dir.join(disc_path)
        };
        discs.push(disc);
    }

    if discs.is_empty() {
        return Err("playlist references no disc files".to_string());
    }

    let disc1 = discs[0].clone();
    if !disc1.is_file() {
        return Err(format!("disc 1 not found: {}", disc1.display()));
    }
    let size = disc1
        .metadata()
        .map_err(|e| format!("unreadable disc 1: {e}"))?
        .len();

    let basename = display_basename(path, RomKind::Playlist);
    let parsed = parse_name(&basename);
    Ok(RomEntity {
        kind: RomKind::Playlist,
        query_filename: disc1
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        primary_file: disc1,
        path: path.to_path_buf(),
        basename,
        size,
        hash: None,
        regions: parsed.regions,
        languages: parsed.languages,
        aux_files: discs.into_iter().skip(1).collect(),
    })
}

/// A directory named like a disc file must contain exactly that file
/// (same name as the directory); it becomes the identity.
fn scan_disc_folder(path: &Path) -> Result<RomEntity, String> {
    let dir_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| "directory has no name".to_string())?;
    let contained = path.join(&dir_name);
    if !contained.is_file() {
        return Err(format!(
            "disc folder is missing contained file '{dir_name}'"
        ));
    }
    let size = contained
        .metadata()
        .map_err(|e| format!("unreadable contained file: {e}"))?
        .len();

    let mut aux_files = Vec::new();
    if let Ok(others) = std::fs::read_dir(path) {
        for other in others.flatten() {
            let other_path = other.path();
            if other_path.is_file() && other_path != contained {
                aux_files.push(other_path);
            }
        }
        aux_files.sort();
    }

    let basename = display_basename(path, RomKind::DiscFolder);
    let parsed = parse_name(&basename);
    Ok(RomEntity {
        kind: RomKind::DiscFolder,
        query_filename: dir_name,
        primary_file: contained,
        path: path.to_path_buf(),
        basename,
        size,
        hash: None,
        regions: parsed.regions,
        languages: parsed.languages,
        aux_files,
    })
}

/// Drop playlist/disc-folder pairs whose stems collide, reporting both.
fn drop_playlist_folder_conflicts(outcome: &mut ScanOutcome) {
    let playlist_stems: Vec<String> = outcome
        .roms
        .iter()
        .filter(|r| r.kind == RomKind::Playlist)
        .map(|r| r.basename.clone())
        .collect();

    let mut conflicting = Vec::new();
    for rom in &outcome.roms {
        if rom.kind != RomKind::DiscFolder {
            continue;
        }
        let folder_stem = rom
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if playlist_stems.contains(&folder_stem) {
            conflicting.push(folder_stem);
        }
    }

    for stem in conflicting {
        outcome.conflicts.push(ConflictReport::new(
            stem.clone(),
            "both an .m3u playlist and a disc folder exist; dropping both",
        ));
        outcome.roms.retain(|r| {
            let folder_stem = r
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            !(r.kind == RomKind::Playlist && r.basename == stem
                || r.kind == RomKind::DiscFolder && folder_stem == stem)
        });
    }
}

/// Display basenames must be unique within a platform; later duplicates
/// are dropped with a report.
fn drop_duplicate_basenames(outcome: &mut ScanOutcome) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut duplicates = Vec::new();
    for (i, rom) in outcome.roms.iter().enumerate() {
        if seen.contains_key(&rom.basename) {
            duplicates.push(i);
            outcome.conflicts.push(ConflictReport::new(
                rom.basename.clone(),
                "duplicate display basename; keeping the first entry",
            ));
        } else {
            seen.insert(rom.basename.clone(), i);
        }
    }
    for &i in duplicates.iter().rev() {
        outcome.roms.remove(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn platform(rom_dir: PathBuf, extensions: &[&str]) -> Platform {
        Platform {
            name: "psx".into(),
            fullname: "Sony PlayStation".into(),
            rom_dir,
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            provider_id: Some(57),
        }
    }

    #[test]
    fn single_file_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("World Explorer (World).zip"), b"rom").unwrap();
        fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".zip"])).unwrap();
        assert_eq!(outcome.roms.len(), 1);
        let rom = &outcome.roms[0];
        assert_eq!(rom.kind, RomKind::Single);
        assert_eq!(rom.basename, "World Explorer (World)");
        assert_eq!(rom.query_filename, "World Explorer (World).zip");
        assert_eq!(rom.size, 3);
        assert_eq!(rom.regions, vec![curateur_core::Region::World]);
    }

    #[test]
    fn playlist_uses_disc1_identity() {
        let dir = tempfile::tempdir().unwrap();
        let multidisc = dir.path().join(".multidisc");
        fs::create_dir(&multidisc).unwrap();
        fs::write(multidisc.join("Sample Saga (Disc 1).cue"), b"disc-one").unwrap();
        fs::write(multidisc.join("Sample Saga (Disc 2).cue"), b"disc-two!").unwrap();
        fs::write(
            dir.path().join("Sample Saga.m3u"),
            "# playlist\n\n./.multidisc/Sample Saga (Disc 1).cue\n./.multidisc/Sample Saga (Disc 2).cue\n",
        )
        .unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue", ".m3u"])).unwrap();
        assert_eq!(outcome.roms.len(), 1);
        let rom = &outcome.roms[0];
        assert_eq!(rom.kind, RomKind::Playlist);
        assert_eq!(rom.basename, "Sample Saga");
        assert_eq!(rom.query_filename, "Sample Saga (Disc 1).cue");
        assert_eq!(rom.size, 8);
        assert_eq!(rom.aux_files.len(), 1);
        assert_eq!(rom.gamelist_path(), "./Sample Saga.m3u");
    }

    #[test]
    fn playlist_with_missing_disc1_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Broken.m3u"), "./gone/Disc 1.cue\n").unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue", ".m3u"])).unwrap();
        assert!(outcome.roms.is_empty());
        assert_eq!(outcome.conflicts.len(), 1);
        assert!(outcome.conflicts[0].detail.contains("disc 1 not found"));
    }

    #[test]
    fn disc_folder_scan() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Demo Orbit (Disc 1).cue");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("Demo Orbit (Disc 1).cue"), b"cue-sheet").unwrap();
        fs::write(folder.join("Demo Orbit (Disc 1).bin"), b"data").unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue"])).unwrap();
        assert_eq!(outcome.roms.len(), 1);
        let rom = &outcome.roms[0];
        assert_eq!(rom.kind, RomKind::DiscFolder);
        assert_eq!(rom.basename, "Demo Orbit (Disc 1).cue");
        assert_eq!(rom.primary_file, folder.join("Demo Orbit (Disc 1).cue"));
        assert_eq!(rom.aux_files.len(), 1);
    }

    #[test]
    fn disc_folder_without_contained_file_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Empty (Disc 1).cue");
        fs::create_dir(&folder).unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue"])).unwrap();
        assert!(outcome.roms.is_empty());
        assert_eq!(outcome.conflicts.len(), 1);
    }

    #[test]
    fn playlist_and_disc_folder_conflict_drops_both() {
        let dir = tempfile::tempdir().unwrap();
        // Playlist "Title.m3u" with a real disc 1.
        fs::write(dir.path().join("Disc.cue"), b"cue").unwrap();
        fs::write(dir.path().join("Title.m3u"), "./Disc.cue\n").unwrap();
        // Disc folder "Title.cue/" with contained file.
        let folder = dir.path().join("Title.cue");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("Title.cue"), b"cue-sheet").unwrap();
        // An unrelated entity survives.
        fs::write(dir.path().join("Other.cue"), b"cue").unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue", ".m3u"])).unwrap();
        let names: Vec<&str> = outcome.roms.iter().map(|r| r.basename.as_str()).collect();
        assert!(!names.contains(&"Title"));
        assert!(!names.contains(&"Title.cue"));
        assert!(names.contains(&"Other"));
        assert!(outcome
            .conflicts
            .iter()
            .any(|c| c.detail.contains("dropping both")));
    }

    #[test]
    fn missing_rom_dir_is_empty_not_error() {
        let outcome =
            scan_platform(&platform(PathBuf::from("/nonexistent/roms/psx"), &[".cue"]))
                .unwrap();
        assert!(outcome.roms.is_empty());
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn duplicate_basenames_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Game.bin"), b"a").unwrap();
        fs::write(dir.path().join("Game.cue"), b"b").unwrap();

        let outcome =
            scan_platform(&platform(dir.path().to_path_buf(), &[".cue", ".bin"])).unwrap();
        assert_eq!(outcome.roms.len(), 1);
        assert_eq!(outcome.conflicts.len(), 1);
    }
}

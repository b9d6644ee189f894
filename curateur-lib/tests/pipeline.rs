//! Scan → identity → evaluate over a real directory tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use curateur_core::hasher::compute_identity;
use curateur_core::{HashAlgorithm, Platform};
use curateur_gamelist::{GameEntry, ProvenanceRecord};
use curateur_lib::evaluator::{evaluate, Action, EvalPolicy};
use curateur_lib::scanner::scan_platform;
use curateur_lib::UpdatePolicy;
use curateur_scraper::MediaKind;

fn platform(rom_dir: PathBuf) -> Platform {
    Platform {
        name: "nes".into(),
        fullname: "Nintendo Entertainment System".into(),
        rom_dir,
        extensions: vec![".zip".into(), ".nes".into()],
        provider_id: Some(3),
    }
}

fn policy() -> EvalPolicy {
    EvalPolicy {
        update: UpdatePolicy::ChangedOnly,
        skip_scraped: true,
        enabled_media: vec![MediaKind::Cover, MediaKind::Screenshot],
    }
}

#[test]
fn fresh_rom_is_scheduled_for_full_scrape() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("World Explorer (World).zip"), b"123456789").unwrap();

    let outcome = scan_platform(&platform(dir.path().to_path_buf())).unwrap();
    assert_eq!(outcome.roms.len(), 1);

    let mut rom = outcome.roms.into_iter().next().unwrap();
    let identity =
        compute_identity(&rom.primary_file, HashAlgorithm::Crc32, u64::MAX).unwrap();
    rom.hash = identity.hash;
    assert_eq!(rom.hash.as_deref(), Some("CBF43926"));

    let presence: BTreeMap<MediaKind, bool> =
        [(MediaKind::Cover, false), (MediaKind::Screenshot, false)].into();
    let decision = evaluate(&rom, None, None, &presence, &policy());
    assert_eq!(decision.action, Action::FullScrape);
    assert_eq!(
        decision.media_needed,
        vec![MediaKind::Cover, MediaKind::Screenshot]
    );
    assert!(decision.needs_provider);
}

#[test]
fn scraped_rom_with_media_on_disk_skips() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("World Explorer (World).zip"), b"123456789").unwrap();

    let outcome = scan_platform(&platform(dir.path().to_path_buf())).unwrap();
    let mut rom = outcome.roms.into_iter().next().unwrap();
    rom.hash = Some("CBF43926".into());

    let mut entry = GameEntry::new("./World Explorer (World).zip", "World Explorer");
    entry.desc = Some("Chart the globe.".into());
    entry.provider_id = Some("4242".into());

    let provenance = ProvenanceRecord {
        identity_hash: Some("CBF43926".into()),
        identity_size: Some(9),
        ..Default::default()
    };

    let presence: BTreeMap<MediaKind, bool> =
        [(MediaKind::Cover, true), (MediaKind::Screenshot, true)].into();
    let decision = evaluate(&rom, Some(&entry), Some(&provenance), &presence, &policy());
    assert_eq!(decision.action, Action::Skip);
    assert!(!decision.needs_provider);

    // The same ROM with a changed file hash becomes an update.
    rom.hash = Some("00000000".into());
    let decision = evaluate(&rom, Some(&entry), Some(&provenance), &presence, &policy());
    assert_eq!(decision.action, Action::Update);
}

#[test]
fn playlist_and_disc_folder_tree_matches_expected_shapes() {
    let dir = tempfile::tempdir().unwrap();

    // S2: playlist with discs under .multidisc
    let multidisc = dir.path().join(".multidisc");
    fs::create_dir(&multidisc).unwrap();
    fs::write(multidisc.join("Sample Saga (Disc 1).cue"), b"one").unwrap();
    fs::write(multidisc.join("Sample Saga (Disc 2).cue"), b"two").unwrap();
    fs::write(
        dir.path().join("Sample Saga.m3u"),
        "./.multidisc/Sample Saga (Disc 1).cue\n./.multidisc/Sample Saga (Disc 2).cue\n",
    )
    .unwrap();

    // S3: disc folder
    let folder = dir.path().join("Demo Orbit (Disc 1).cue");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("Demo Orbit (Disc 1).cue"), b"cue-sheet").unwrap();

    let psx = Platform {
        name: "psx".into(),
        fullname: "Sony PlayStation".into(),
        rom_dir: dir.path().to_path_buf(),
        extensions: vec![".cue".into(), ".m3u".into()],
        provider_id: Some(57),
    };
    let outcome = scan_platform(&psx).unwrap();
    assert_eq!(outcome.roms.len(), 2);

    let saga = outcome
        .roms
        .iter()
        .find(|r| r.basename == "Sample Saga")
        .unwrap();
    assert_eq!(saga.gamelist_path(), "./Sample Saga.m3u");
    assert_eq!(saga.query_filename, "Sample Saga (Disc 1).cue");

    let orbit = outcome
        .roms
        .iter()
        .find(|r| r.basename == "Demo Orbit (Disc 1).cue")
        .unwrap();
    assert_eq!(orbit.media_basename(), "Demo Orbit (Disc 1).cue");
    assert_eq!(orbit.primary_file, folder.join("Demo Orbit (Disc 1).cue"));
}

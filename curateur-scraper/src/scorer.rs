//! Confidence scoring for search candidates and name verification for
//! direct matches.
//!
//! A candidate's confidence is a weighted sum: filename similarity (0.40),
//! region match (0.30), size proximity (0.15), media breadth (0.10), and
//! Provider rating (0.05). Ties break by insertion order.

use curateur_core::name_parser::{normalize_for_match, word_overlap};
use curateur_core::RomEntity;

use crate::media::MediaKind;
use crate::types::GameRecord;

const WEIGHT_FILENAME: f64 = 0.40;
const WEIGHT_REGION: f64 = 0.30;
const WEIGHT_SIZE: f64 = 0.15;
const WEIGHT_MEDIA: f64 = 0.10;
const WEIGHT_RATING: f64 = 0.05;

/// A search candidate with its computed confidence.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// Index into the original candidate list.
    pub index: usize,
    pub confidence: f64,
}

/// Outcome of candidate selection.
#[derive(Debug, Clone)]
pub enum Selection {
    /// The top candidate met the threshold.
    Auto { index: usize, confidence: f64 },
    /// Interactive mode: surface these (best first) to the operator.
    NeedsPrompt(Vec<ScoredCandidate>),
    /// No candidate qualified.
    Unmatched,
}

/// Compute a candidate's confidence in [0, 1].
pub fn confidence(rom: &RomEntity, record: &GameRecord) -> f64 {
    let filename = score_filename(rom, record);
    let region = score_region(rom, record);
    let size = score_size(rom, record);
    let media = score_media(record);
    let rating = record.rating.map_or(0.5, |r| f64::from(r));

    let total = filename * WEIGHT_FILENAME
        + region * WEIGHT_REGION
        + size * WEIGHT_SIZE
        + media * WEIGHT_MEDIA
        + rating * WEIGHT_RATING;

    log::debug!(
        "Score for '{}' vs record {}: filename={filename:.2} region={region:.2} \
         size={size:.2} media={media:.2} rating={rating:.2} -> {total:.2}",
        rom.basename,
        record.id,
    );
    total
}

/// Select from search candidates, preserving insertion order on ties.
pub fn select_candidate(
    rom: &RomEntity,
    candidates: &[GameRecord],
    threshold: f64,
    interactive: bool,
) -> Selection {
    if candidates.is_empty() {
        return Selection::Unmatched;
    }

    let scored: Vec<ScoredCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(index, record)| ScoredCandidate {
            index,
            confidence: confidence(rom, record),
        })
        .collect();

    // Strictly-greater comparison keeps the earliest candidate on ties.
    let mut best = 0;
    for (i, candidate) in scored.iter().enumerate().skip(1) {
        if candidate.confidence > scored[best].confidence {
            best = i;
        }
    }

    if scored[best].confidence >= threshold {
        return Selection::Auto {
            index: scored[best].index,
            confidence: scored[best].confidence,
        };
    }

    if interactive {
        let mut ordered = scored;
        ordered.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        return Selection::NeedsPrompt(ordered);
    }

    Selection::Unmatched
}

/// Verify that a direct match's names resemble the ROM's basename.
///
/// Accepts at or above the threshold, or on significant word overlap.
/// A threshold of 0.0 (verification disabled) accepts anything.
pub fn verify_name(basename: &str, record: &GameRecord, threshold: f64) -> (bool, f64) {
    if threshold <= 0.0 {
        return (true, 1.0);
    }

    let normalized = normalize_for_match(basename);
    let mut best = 0.0f64;
    for name in &record.names {
        let similarity =
            strsim::normalized_levenshtein(&normalized, &normalize_for_match(&name.text));
        if similarity > best {
            best = similarity;
        }
    }

    if best >= threshold {
        return (true, best);
    }
    if record
        .names
        .iter()
        .any(|n| word_overlap(basename, &n.text))
    {
        return (true, best);
    }
    (false, best)
}

fn score_filename(rom: &RomEntity, record: &GameRecord) -> f64 {
    if record.names.is_empty() {
        return 0.0;
    }
    let rom_name = normalize_for_match(&rom.basename);
    record
        .names
        .iter()
        .map(|n| strsim::normalized_levenshtein(&rom_name, &normalize_for_match(&n.text)))
        .fold(0.0, f64::max)
}

/// 1.0 when the ROM's top region appears among the candidate's regions,
/// decreasing by 0.2 per position down the ROM's own region list (floor
/// 0.2); 0.1 when none match; 0.5 when the ROM declares no region.
fn score_region(rom: &RomEntity, record: &GameRecord) -> f64 {
    if rom.regions.is_empty() {
        return 0.5;
    }
    for (position, region) in rom.regions.iter().enumerate() {
        let code = region.provider_code();
        if record.names.iter().any(|n| n.region == code) {
            return (1.0 - 0.2 * position as f64).max(0.2);
        }
    }
    0.1
}

fn score_size(rom: &RomEntity, record: &GameRecord) -> f64 {
    let Some(record_size) = record.rom_size.filter(|&s| s > 0) else {
        return 0.5;
    };
    if rom.size == 0 {
        return 0.5;
    }
    if rom.size == record_size {
        return 1.0;
    }
    let diff = rom.size.abs_diff(record_size) as f64;
    let larger = rom.size.max(record_size) as f64;
    let percent = diff / larger * 100.0;
    if percent < 5.0 {
        0.9
    } else if percent < 10.0 {
        0.7
    } else if percent < 20.0 {
        0.5
    } else {
        0.2
    }
}

/// Linear up to 1.0 at three or more recognized media types.
fn score_media(record: &GameRecord) -> f64 {
    let mut kinds: Vec<&str> = Vec::new();
    for media in &record.medias {
        if MediaKind::ALL
            .iter()
            .any(|k| k.provider_code() == media.media_type)
            && !kinds.contains(&media.media_type.as_str())
        {
            kinds.push(&media.media_type);
        }
    }
    (kinds.len() as f64 / 3.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MediaItem, RegionText};
    use curateur_core::{Region, RomKind};
    use std::path::PathBuf;

    fn rom(basename: &str, regions: Vec<Region>, size: u64) -> RomEntity {
        RomEntity {
            kind: RomKind::Single,
            path: PathBuf::from(format!("/roms/nes/{basename}.zip")),
            basename: basename.to_string(),
            query_filename: format!("{basename}.zip"),
            primary_file: PathBuf::from(format!("/roms/nes/{basename}.zip")),
            size,
            hash: None,
            regions,
            languages: vec![],
            aux_files: vec![],
        }
    }

    fn named_record(names: &[(&str, &str)]) -> GameRecord {
        GameRecord {
            id: "1".into(),
            names: names
                .iter()
                .map(|(region, text)| RegionText {
                    region: region.to_string(),
                    text: text.to_string(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_name_and_region_scores_high() {
        let rom = rom("World Explorer (World)", vec![Region::World], 0);
        let record = named_record(&[("wor", "World Explorer")]);
        let score = confidence(&rom, &record);
        // filename 1.0 * .40 + region 1.0 * .30 + size 0.5 * .15 + rating 0.5 * .05
        assert!(score > 0.77 && score < 0.81, "score = {score}");
    }

    #[test]
    fn region_bracket_decay() {
        let record = named_record(&[("jp", "Game")]);
        // Top region matches: 1.0
        let top = rom("Game", vec![Region::Japan, Region::Usa], 0);
        // Second region matches: 0.8
        let second = rom("Game", vec![Region::Usa, Region::Japan], 0);
        // No region matches: 0.1
        let none = rom("Game", vec![Region::Europe], 0);
        // No region declared: 0.5
        let unknown = rom("Game", vec![], 0);

        assert!(score_region(&top, &record) == 1.0);
        assert!((score_region(&second, &record) - 0.8).abs() < 1e-9);
        assert!((score_region(&none, &record) - 0.1).abs() < 1e-9);
        assert!((score_region(&unknown, &record) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn size_brackets() {
        let mut record = named_record(&[("us", "Game")]);
        record.rom_size = Some(1000);
        assert_eq!(score_size(&rom("Game", vec![], 1000), &record), 1.0);
        assert_eq!(score_size(&rom("Game", vec![], 960), &record), 0.9);
        assert_eq!(score_size(&rom("Game", vec![], 930), &record), 0.7);
        assert_eq!(score_size(&rom("Game", vec![], 850), &record), 0.5);
        assert_eq!(score_size(&rom("Game", vec![], 500), &record), 0.2);
        record.rom_size = None;
        assert_eq!(score_size(&rom("Game", vec![], 1000), &record), 0.5);
    }

    #[test]
    fn media_breadth_saturates_at_three() {
        let mut record = named_record(&[("us", "Game")]);
        let mk = |t: &str| MediaItem {
            media_type: t.into(),
            region: "us".into(),
            url: "u".into(),
            format: "png".into(),
            size: None,
            crc: None,
        };
        record.medias = vec![mk("box-2D")];
        assert!((score_media(&record) - 1.0 / 3.0).abs() < 1e-9);
        record.medias = vec![mk("box-2D"), mk("ss"), mk("sstitle"), mk("fanart")];
        assert_eq!(score_media(&record), 1.0);
        // Duplicates of one type count once.
        record.medias = vec![mk("box-2D"), mk("box-2D")];
        assert!((score_media(&record) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn selection_tie_breaks_by_insertion_order() {
        let rom = rom("Game", vec![], 0);
        let a = named_record(&[("us", "Game")]);
        let b = named_record(&[("us", "Game")]);
        match select_candidate(&rom, &[a, b], 0.1, false) {
            Selection::Auto { index, .. } => assert_eq!(index, 0),
            other => panic!("expected auto selection, got {other:?}"),
        }
    }

    #[test]
    fn below_threshold_prompts_only_when_interactive() {
        let rom = rom("Completely Different", vec![Region::Europe], 0);
        let candidates = vec![named_record(&[("jp", "Zzz")])];
        assert!(matches!(
            select_candidate(&rom, &candidates, 0.9, false),
            Selection::Unmatched
        ));
        assert!(matches!(
            select_candidate(&rom, &candidates, 0.9, true),
            Selection::NeedsPrompt(_)
        ));
    }

    #[test]
    fn zero_candidates_never_prompt() {
        let rom = rom("Game", vec![], 0);
        assert!(matches!(
            select_candidate(&rom, &[], 0.5, true),
            Selection::Unmatched
        ));
    }

    #[test]
    fn verify_accepts_at_exact_threshold() {
        let record = named_record(&[("us", "abcde")]);
        // "abcdx" vs "abcde": levenshtein 1 edit over 5 chars = 0.8.
        let (ok, score) = verify_name("abcdx", &record, 0.8);
        assert!(ok, "score was {score}");
        let (ok_above, _) = verify_name("abcdx", &record, 0.81);
        assert!(!ok_above);
    }

    #[test]
    fn verify_word_overlap_rescues_low_similarity() {
        let record = named_record(&[("us", "Super Kingdom Adventure Deluxe Edition")]);
        let (ok, score) = verify_name("Kingdom Adventure", &record, 0.8);
        assert!(score < 0.8);
        assert!(ok);
    }

    #[test]
    fn verify_disabled_accepts_anything() {
        let record = named_record(&[("us", "Totally Unrelated")]);
        let (ok, _) = verify_name("Game", &record, 0.0);
        assert!(ok);
    }
}

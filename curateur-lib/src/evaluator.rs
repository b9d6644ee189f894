//! Per-ROM decision evaluator.
//!
//! Pure: the same inputs always produce the same decision, independent of
//! any other item. The decision carries the media types to fetch and
//! whether a Provider call is needed (all non-skip actions need one,
//! media-only included — media URLs only exist in Provider responses).

use std::collections::BTreeMap;

use curateur_core::RomEntity;
use curateur_gamelist::{GameEntry, ProvenanceRecord};
use curateur_scraper::MediaKind;

use crate::config::UpdatePolicy;

/// What to do with one ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    FullScrape,
    MediaOnly,
    Update,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::FullScrape => write!(f, "full scrape"),
            Self::MediaOnly => write!(f, "media only"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// Evaluator output.
#[derive(Debug, Clone)]
pub struct Decision {
    pub action: Action,
    /// Media types to fetch: empty for skip, the missing subset for
    /// media-only, all enabled types otherwise.
    pub media_needed: Vec<MediaKind>,
    /// Whether this action requires a Provider call.
    pub needs_provider: bool,
    pub reason: &'static str,
}

impl Decision {
    fn new(action: Action, media_needed: Vec<MediaKind>, reason: &'static str) -> Self {
        Self {
            needs_provider: action != Action::Skip,
            action,
            media_needed,
            reason,
        }
    }
}

/// Policy inputs to the evaluator.
#[derive(Debug, Clone)]
pub struct EvalPolicy {
    pub update: UpdatePolicy,
    pub skip_scraped: bool,
    pub enabled_media: Vec<MediaKind>,
}

/// Decide the action for one ROM.
///
/// `media_present` holds, for each enabled type, whether a valid file
/// already exists on disk.
pub fn evaluate(
    rom: &RomEntity,
    entry: Option<&GameEntry>,
    provenance: Option<&ProvenanceRecord>,
    media_present: &BTreeMap<MediaKind, bool>,
    policy: &EvalPolicy,
) -> Decision {
    let all_enabled = policy.enabled_media.clone();

    let Some(entry) = entry else {
        return Decision::new(Action::FullScrape, all_enabled, "not in catalog");
    };

    if !entry.has_complete_metadata() {
        return Decision::new(Action::FullScrape, all_enabled, "metadata incomplete");
    }

    let changed = identity_changed(rom, provenance);

    match policy.update {
        UpdatePolicy::Always => {
            return Decision::new(Action::Update, all_enabled, "update policy is always");
        }
        UpdatePolicy::ChangedOnly if changed => {
            return Decision::new(Action::Update, all_enabled, "ROM changed since last scrape");
        }
        _ => {}
    }

    if policy.skip_scraped {
        let missing: Vec<MediaKind> = policy
            .enabled_media
            .iter()
            .filter(|kind| !media_present.get(kind).copied().unwrap_or(false))
            .copied()
            .collect();
        if missing.is_empty() {
            Decision::new(Action::Skip, Vec::new(), "already scraped, media complete")
        } else {
            Decision::new(Action::MediaOnly, missing, "media missing")
        }
    } else {
        Decision::new(Action::FullScrape, all_enabled, "skip disabled")
    }
}

/// The provenance identity hash is the sole change signal; when either
/// hash is unavailable (size cap), the recorded size stands in.
fn identity_changed(rom: &RomEntity, provenance: Option<&ProvenanceRecord>) -> bool {
    let Some(provenance) = provenance else {
        return false;
    };
    match (&rom.hash, &provenance.identity_hash) {
        (Some(current), Some(stored)) => !current.eq_ignore_ascii_case(stored),
        _ => provenance
            .identity_size
            .is_some_and(|stored| stored != rom.size),
    }
}

//! Conservative merge of Provider data into the existing catalog.
//!
//! User-owned fields (favorite, playcount, lastplayed, hidden, kidgame)
//! are never written by the engine. Provider-owned fields are refreshed,
//! but an empty Provider value never blanks a populated field under the
//! default policy. Unknown sub-elements pass through untouched.

use crate::entry::GameEntry;

/// Named merge strategies. Applied uniformly across one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Keep user edits; refresh provider-owned fields, never blanking a
    /// populated field with an empty one.
    #[default]
    PreserveUserEdits,
    /// Provider values win on every provider-owned field, including
    /// empties. User-owned fields and unknown sub-elements still survive.
    ProviderWins,
}

impl MergePolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "preserve_user_edits" => Some(Self::PreserveUserEdits),
            "provider_wins" => Some(Self::ProviderWins),
            _ => None,
        }
    }
}

/// What happened to one field during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// A single field-level change.
#[derive(Debug, Clone)]
pub struct FieldChange {
    pub field: &'static str,
    pub kind: ChangeKind,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Field-level changes for one entry.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    pub path: String,
    pub changes: Vec<FieldChange>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// One grep-stable line for the platform change log, or `None` when
    /// nothing changed.
    pub fn summary_line(&self) -> Option<String> {
        if self.changes.is_empty() {
            return None;
        }
        let fields: Vec<String> = self
            .changes
            .iter()
            .map(|c| format!("{} {}", c.kind, c.field))
            .collect();
        Some(format!("{}: {}", self.path, fields.join("; ")))
    }
}

/// Merge a freshly scraped entry with the existing catalog entry.
///
/// With no existing entry the scraped entry is taken as-is (minus any
/// user-owned values; the engine never synthesizes those).
pub fn merge_entries(
    existing: Option<&GameEntry>,
    scraped: &GameEntry,
    policy: MergePolicy,
) -> (GameEntry, ChangeReport) {
    let mut report = ChangeReport {
        path: existing.map_or_else(|| scraped.path.clone(), |e| e.path.clone()),
        changes: Vec::new(),
    };

    let Some(existing) = existing else {
        let mut merged = scraped.clone();
        // First creation: user-owned fields start at their defaults.
        merged.favorite = false;
        merged.playcount = None;
        merged.lastplayed = None;
        merged.hidden = false;
        merged.kidgame = false;
        record_initial(&merged, &mut report);
        return (merged, report);
    };

    let mut merged = existing.clone();

    if let Some(ref id) = scraped.provider_id {
        if merged.provider_id.as_deref() != Some(id.as_str()) {
            merged.provider_id = Some(id.clone());
        }
    }

    if !scraped.name.is_empty() && scraped.name != merged.name {
        report.changes.push(FieldChange {
            field: "name",
            kind: ChangeKind::Modified,
            old: Some(merged.name.clone()),
            new: Some(scraped.name.clone()),
        });
        merged.name = scraped.name.clone();
    }

    merge_text(policy, "desc", &mut merged.desc, &scraped.desc, &mut report);
    merge_text(
        policy,
        "releasedate",
        &mut merged.releasedate,
        &scraped.releasedate,
        &mut report,
    );
    merge_text(
        policy,
        "developer",
        &mut merged.developer,
        &scraped.developer,
        &mut report,
    );
    merge_text(
        policy,
        "publisher",
        &mut merged.publisher,
        &scraped.publisher,
        &mut report,
    );
    merge_text(policy, "genre", &mut merged.genre, &scraped.genre, &mut report);
    merge_text(
        policy,
        "players",
        &mut merged.players,
        &scraped.players,
        &mut report,
    );

    merge_rating(policy, &mut merged.rating, scraped.rating, &mut report);

    // Media references always point at what this run produced or verified.
    merge_text(policy, "image", &mut merged.image, &scraped.image, &mut report);
    merge_text(
        policy,
        "thumbnail",
        &mut merged.thumbnail,
        &scraped.thumbnail,
        &mut report,
    );
    merge_text(
        policy,
        "marquee",
        &mut merged.marquee,
        &scraped.marquee,
        &mut report,
    );
    merge_text(policy, "video", &mut merged.video, &scraped.video, &mut report);

    (merged, report)
}

fn merge_text(
    policy: MergePolicy,
    field: &'static str,
    current: &mut Option<String>,
    incoming: &Option<String>,
    report: &mut ChangeReport,
) {
    let incoming_value = incoming.as_deref().filter(|v| !v.is_empty());
    match (policy, incoming_value) {
        (_, Some(value)) => {
            if current.as_deref() != Some(value) {
                report.changes.push(FieldChange {
                    field,
                    kind: if current.is_some() {
                        ChangeKind::Modified
                    } else {
                        ChangeKind::Added
                    },
                    old: current.clone(),
                    new: Some(value.to_string()),
                });
                *current = Some(value.to_string());
            }
        }
        (MergePolicy::ProviderWins, None) => {
            if current.is_some() {
                report.changes.push(FieldChange {
                    field,
                    kind: ChangeKind::Removed,
                    old: current.clone(),
                    new: None,
                });
                *current = None;
            }
        }
        (MergePolicy::PreserveUserEdits, None) => {}
    }
}

fn merge_rating(
    policy: MergePolicy,
    current: &mut Option<f32>,
    incoming: Option<f32>,
    report: &mut ChangeReport,
) {
    match (policy, incoming) {
        (_, Some(value)) => {
            if current.map_or(true, |c| (c - value).abs() > f32::EPSILON) {
                report.changes.push(FieldChange {
                    field: "rating",
                    kind: if current.is_some() {
                        ChangeKind::Modified
                    } else {
                        ChangeKind::Added
                    },
                    old: current.map(|c| c.to_string()),
                    new: Some(value.to_string()),
                });
                *current = Some(value);
            }
        }
        (MergePolicy::ProviderWins, None) => {
            if current.is_some() {
                report.changes.push(FieldChange {
                    field: "rating",
                    kind: ChangeKind::Removed,
                    old: current.map(|c| c.to_string()),
                    new: None,
                });
                *current = None;
            }
        }
        (MergePolicy::PreserveUserEdits, None) => {}
    }
}

fn record_initial(entry: &GameEntry, report: &mut ChangeReport) {
    let mut push = |field: &'static str, value: Option<String>| {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            report.changes.push(FieldChange {
                field,
                kind: ChangeKind::Added,
                old: None,
                new: Some(v),
            });
        }
    };
    push("name", Some(entry.name.clone()));
    push("desc", entry.desc.clone());
    push("releasedate", entry.releasedate.clone());
    push("developer", entry.developer.clone());
    push("publisher", entry.publisher.clone());
    push("genre", entry.genre.clone());
    push("players", entry.players.clone());
    push("rating", entry.rating.map(|r| r.to_string()));
    push("image", entry.image.clone());
    push("thumbnail", entry.thumbnail.clone());
    push("marquee", entry.marquee.clone());
    push("video", entry.video.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ExtraField;

    fn existing() -> GameEntry {
        GameEntry {
            path: "./Game.zip".into(),
            name: "Game".into(),
            provider_id: Some("10".into()),
            desc: Some("Old description".into()),
            developer: Some("Old Dev".into()),
            favorite: true,
            playcount: Some(12),
            lastplayed: Some("20250101T120000".into()),
            extra: vec![ExtraField {
                tag: "mycustom".into(),
                attrs: vec![],
                raw: "tag".into(),
                empty: false,
            }],
            ..Default::default()
        }
    }

    fn scraped() -> GameEntry {
        GameEntry {
            path: "./Game.zip".into(),
            name: "Game".into(),
            provider_id: Some("10".into()),
            desc: Some("New description".into()),
            ..Default::default()
        }
    }

    #[test]
    fn user_fields_and_extras_survive() {
        let (merged, report) = merge_entries(
            Some(&existing()),
            &scraped(),
            MergePolicy::PreserveUserEdits,
        );
        assert!(merged.favorite);
        assert_eq!(merged.playcount, Some(12));
        assert_eq!(merged.lastplayed.as_deref(), Some("20250101T120000"));
        assert_eq!(merged.extra.len(), 1);
        assert_eq!(merged.extra[0].raw, "tag");
        assert_eq!(merged.desc.as_deref(), Some("New description"));

        // Only the description changed.
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].field, "desc");
        assert_eq!(report.changes[0].kind, ChangeKind::Modified);
    }

    #[test]
    fn empty_provider_value_never_blanks_under_default_policy() {
        let mut incoming = scraped();
        incoming.desc = None;
        let (merged, report) =
            merge_entries(Some(&existing()), &incoming, MergePolicy::PreserveUserEdits);
        assert_eq!(merged.desc.as_deref(), Some("Old description"));
        assert_eq!(merged.developer.as_deref(), Some("Old Dev"));
        assert!(report.is_empty());
    }

    #[test]
    fn provider_wins_blanks_missing_fields() {
        let mut incoming = scraped();
        incoming.desc = None;
        let (merged, report) =
            merge_entries(Some(&existing()), &incoming, MergePolicy::ProviderWins);
        assert!(merged.desc.is_none());
        assert!(report
            .changes
            .iter()
            .any(|c| c.field == "desc" && c.kind == ChangeKind::Removed));
        // User fields still intact even under provider_wins.
        assert!(merged.favorite);
    }

    #[test]
    fn first_creation_has_no_user_fields() {
        let mut incoming = scraped();
        incoming.favorite = true;
        incoming.playcount = Some(3);
        let (merged, report) = merge_entries(None, &incoming, MergePolicy::PreserveUserEdits);
        assert!(!merged.favorite);
        assert!(merged.playcount.is_none());
        assert!(report.changes.iter().any(|c| c.field == "desc"));
    }

    #[test]
    fn summary_line_format() {
        let (_, report) = merge_entries(
            Some(&existing()),
            &scraped(),
            MergePolicy::PreserveUserEdits,
        );
        assert_eq!(
            report.summary_line().unwrap(),
            "./Game.zip: modified desc"
        );
    }
}

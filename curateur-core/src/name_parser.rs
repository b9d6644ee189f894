//! Parser for No-Intro/Redump style ROM basenames.
//!
//! Names encode metadata in parenthesized tags:
//! ```text
//! Game Name (Region1, Region2) (En,Fr,De) (Rev 1)
//! ```
//! Region and language tokens are matched against the closed sets in
//! [`crate::region`]; everything else (revisions, disc numbers, dump flags)
//! is ignored.

use crate::region::{Language, Region};

/// Parsed components of a display basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    /// Base title without any parenthesized or bracketed tags.
    pub title: String,
    /// Declared regions in source order.
    pub regions: Vec<Region>,
    /// Declared languages in source order.
    pub languages: Vec<Language>,
}

/// Parse a display basename into its title plus declared regions/languages.
pub fn parse_name(basename: &str) -> ParsedName {
    let (title, tags) = split_title_and_tags(basename);

    let mut regions = Vec::new();
    let mut languages = Vec::new();
    for tag in &tags {
        for token in tag.split(',') {
            // Two-letter language codes shadow the same-lettered region
            // abbreviations ("Fr", "De", ...): language wins.
            if let Some(language) = Language::from_token(token) {
                if !languages.contains(&language) {
                    languages.push(language);
                }
            } else if let Some(region) = Region::from_token(token) {
                if !regions.contains(&region) {
                    regions.push(region);
                }
            }
        }
    }

    ParsedName {
        title,
        regions,
        languages,
    }
}

/// Split a basename into the base title and the contents of each
/// parenthesized group. Bracketed groups are consumed but discarded
/// (dump-status flags carry no region/language data).
fn split_title_and_tags(name: &str) -> (String, Vec<String>) {
    let mut tags = Vec::new();
    let mut title_end = None;
    let mut chars = name.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        let (open, close, keep) = match ch {
            '(' => ('(', ')', true),
            '[' => ('[', ']', false),
            _ => continue,
        };

        if title_end.is_none() {
            title_end = Some(i);
        }

        let mut depth = 1u32;
        let start = i + open.len_utf8();
        let mut end = start;

        for (j, c) in chars.by_ref() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    end = j;
                    break;
                }
            }
        }

        if keep && end > start {
            tags.push(name[start..end].to_string());
        }
    }

    let title = match title_end {
        Some(pos) => name[..pos].trim_end().to_string(),
        None => name.trim().to_string(),
    };

    (title, tags)
}

/// Normalize a name for fuzzy comparison against Provider names.
///
/// Strips parenthesized/bracketed tags, a known ROM extension, a leading
/// "The", and all punctuation; lowercases and collapses whitespace.
pub fn normalize_for_match(name: &str) -> String {
    let mut result = name.to_lowercase();

    for ext in [
        ".zip", ".7z", ".rar", ".nes", ".sfc", ".smc", ".bin", ".cue", ".gdi", ".chd", ".iso",
        ".m3u",
    ] {
        if result.ends_with(ext) {
            result.truncate(result.len() - ext.len());
            break;
        }
    }

    let (title, _) = split_title_and_tags(&result);
    let mut cleaned = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() || ch.is_whitespace() {
            cleaned.push(ch);
        } else {
            cleaned.push(' ');
        }
    }

    let collapsed: String = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.strip_prefix("the ") {
        Some(rest) => rest.to_string(),
        None => collapsed,
    }
}

/// Whether two names share at least half of their significant words.
///
/// Catches matches that raw similarity misses (abbreviations, reordered
/// subtitles). Words shorter than three characters are ignored.
pub fn word_overlap(name1: &str, name2: &str) -> bool {
    let words = |s: &str| -> Vec<String> {
        normalize_for_match(s)
            .split_whitespace()
            .filter(|w| w.len() >= 3)
            .map(|w| w.to_string())
            .collect()
    };

    let words1 = words(name1);
    let words2 = words(name2);
    if words1.is_empty() || words2.is_empty() {
        return false;
    }

    let overlap = words1.iter().filter(|w| words2.contains(w)).count();
    overlap * 2 >= words1.len() || overlap * 2 >= words2.len()
}

/// An XML sub-element the engine does not manage, preserved verbatim for
/// round-trip fidelity (`sortname`, `altemulator`, theme extensions, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraField {
    /// Element tag name.
    pub tag: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Raw inner XML exactly as it appeared (still escaped).
    pub raw: String,
    /// True for self-closing elements (`<tag/>`).
    pub empty: bool,
}

/// One game record in a platform's catalog.
///
/// Fields fall into three classes: user-owned (never written by the engine
/// after first creation), provider-owned (refreshed from Provider data),
/// and media references. Unknown sub-elements ride along in `extra`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameEntry {
    /// Relative ROM path (e.g., `./Game.zip`). Required.
    pub path: String,
    /// Display name. Required.
    pub name: String,
    /// Provider record ID, written as the `id` attribute.
    pub provider_id: Option<String>,

    // Provider-owned metadata
    pub desc: Option<String>,
    /// Rating normalized to 0.0–1.0.
    pub rating: Option<f32>,
    /// Release date in `YYYYMMDDTHHMMSS` form.
    pub releasedate: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub players: Option<String>,

    // Media references (relative to the catalog directory)
    pub image: Option<String>,
    pub thumbnail: Option<String>,
    pub marquee: Option<String>,
    pub video: Option<String>,

    // User-owned fields
    pub favorite: bool,
    pub playcount: Option<u32>,
    pub lastplayed: Option<String>,
    pub hidden: bool,
    pub kidgame: bool,

    /// Unknown sub-elements, in document order.
    pub extra: Vec<ExtraField>,
}

impl GameEntry {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Stem of the ROM path, used to correlate media files with orphaned
    /// entries during integrity cleanup.
    pub fn media_stem(&self) -> String {
        let path = self.path.strip_prefix("./").unwrap_or(&self.path);
        std::path::Path::new(path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    /// Whether the provider-owned portion is complete enough to satisfy
    /// the skip path: a name, a description, and a recorded Provider ID.
    pub fn has_complete_metadata(&self) -> bool {
        !self.name.is_empty()
            && self.desc.as_deref().is_some_and(|d| !d.is_empty())
            && self.provider_id.as_deref().is_some_and(|i| !i.is_empty())
    }
}

/// Convert a Provider release date (`YYYY-MM-DD`, `YYYY-MM`, or `YYYY`)
/// to the frontend's `YYYYMMDDTHHMMSS` form. Unrecognized input passes
/// through unchanged.
pub fn format_release_date(date: &str) -> String {
    let date = date.trim();
    if date.contains('-') {
        let mut parts = date.splitn(3, '-');
        let year = parts.next().unwrap_or("");
        let month = parts.next().unwrap_or("01");
        let day = parts.next().unwrap_or("01");
        if year.len() == 4 {
            return format!("{year}{month:0>2}{day:0>2}T000000");
        }
    } else if date.len() == 4 && date.chars().all(|c| c.is_ascii_digit()) {
        return format!("{date}0101T000000");
    } else if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        return format!("{date}T000000");
    }
    date.to_string()
}

/// Decode the HTML entities the Provider embeds in text fields.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_date_forms() {
        assert_eq!(format_release_date("1996-06-23"), "19960623T000000");
        assert_eq!(format_release_date("1996-6-2"), "19960602T000000");
        assert_eq!(format_release_date("1996"), "19960101T000000");
        assert_eq!(format_release_date("19960623"), "19960623T000000");
        assert_eq!(format_release_date("unknown"), "unknown");
    }

    #[test]
    fn media_stem_strips_prefix_and_extension() {
        let entry = GameEntry::new("./Sample Saga.m3u", "Sample Saga");
        assert_eq!(entry.media_stem(), "Sample Saga");
    }

    #[test]
    fn completeness_requires_name_desc_and_id() {
        let mut entry = GameEntry::new("./a.zip", "A");
        assert!(!entry.has_complete_metadata());
        entry.desc = Some("story".into());
        assert!(!entry.has_complete_metadata());
        entry.provider_id = Some("42".into());
        assert!(entry.has_complete_metadata());
    }

    #[test]
    fn entity_decoding() {
        assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("plain"), "plain");
    }
}

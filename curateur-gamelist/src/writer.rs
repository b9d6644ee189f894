//! Catalog writer.
//!
//! Output is UTF-8, pretty-printed, and deterministic for identical input.
//! Writes are atomic: serialize to a sibling temp file, fsync, rename over
//! the old catalog. The previous catalog is copied to a `.backup.xml`
//! sibling first, so a bad run never costs user edits.

use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::entry::GameEntry;
use crate::error::GamelistError;

const SOFTWARE: &str = "curateur";
const DATABASE: &str = "ScreenScraper.fr";
const WEB: &str = "http://www.screenscraper.fr";

/// Serialize the catalog to a string.
pub fn render(system: &str, entries: &[GameEntry]) -> Result<String, GamelistError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("gameList")))?;

    writer.write_event(Event::Start(BytesStart::new("provider")))?;
    leaf(&mut writer, "System", system)?;
    leaf(&mut writer, "software", SOFTWARE)?;
    leaf(&mut writer, "database", DATABASE)?;
    leaf(&mut writer, "web", WEB)?;
    writer.write_event(Event::End(BytesEnd::new("provider")))?;

    for entry in entries {
        write_game(&mut writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("gameList")))?;

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(|e| GamelistError::malformed(e.to_string()))
}

/// Write the catalog atomically, backing up any existing file.
pub fn write_gamelist(
    path: &Path,
    system: &str,
    entries: &[GameEntry],
) -> Result<(), GamelistError> {
    let xml = render(system, entries)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("xml.tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(xml.as_bytes())?;
        file.sync_all()?;
    }

    if path.exists() {
        let backup = path.with_extension("backup.xml");
        if let Err(e) = std::fs::copy(path, &backup) {
            log::warn!("Could not back up {}: {e}", path.display());
        }
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_game(writer: &mut Writer<Vec<u8>>, entry: &GameEntry) -> Result<(), GamelistError> {
    let mut game = BytesStart::new("game");
    if let Some(ref id) = entry.provider_id {
        game.push_attribute(("id", id.as_str()));
        game.push_attribute(("source", DATABASE));
    }
    writer.write_event(Event::Start(game))?;

    leaf(writer, "path", &entry.path)?;
    leaf(writer, "name", &entry.name)?;

    if let Some(ref desc) = entry.desc {
        leaf(writer, "desc", desc)?;
    }
    if let Some(rating) = entry.rating {
        leaf(writer, "rating", &format_rating(rating))?;
    }
    if let Some(ref date) = entry.releasedate {
        leaf(writer, "releasedate", date)?;
    }
    if let Some(ref dev) = entry.developer {
        leaf(writer, "developer", dev)?;
    }
    if let Some(ref publisher) = entry.publisher {
        leaf(writer, "publisher", publisher)?;
    }
    if let Some(ref genre) = entry.genre {
        leaf(writer, "genre", genre)?;
    }
    if let Some(ref players) = entry.players {
        leaf(writer, "players", players)?;
    }

    if let Some(ref image) = entry.image {
        leaf(writer, "image", image)?;
    }
    if let Some(ref thumbnail) = entry.thumbnail {
        leaf(writer, "thumbnail", thumbnail)?;
    }
    if let Some(ref marquee) = entry.marquee {
        leaf(writer, "marquee", marquee)?;
    }
    if let Some(ref video) = entry.video {
        leaf(writer, "video", video)?;
    }

    if entry.favorite {
        leaf(writer, "favorite", "true")?;
    }
    if let Some(playcount) = entry.playcount {
        leaf(writer, "playcount", &playcount.to_string())?;
    }
    if let Some(ref lastplayed) = entry.lastplayed {
        leaf(writer, "lastplayed", lastplayed)?;
    }
    if entry.hidden {
        leaf(writer, "hidden", "true")?;
    }
    if entry.kidgame {
        leaf(writer, "kidgame", "true")?;
    }

    // Unknown sub-elements, re-emitted verbatim in original order
    for extra in &entry.extra {
        let mut start = BytesStart::new(extra.tag.as_str());
        for (key, value) in &extra.attrs {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if extra.empty || extra.raw.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::from_escaped(extra.raw.as_str())))?;
            writer.write_event(Event::End(BytesEnd::new(extra.tag.as_str())))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("game")))?;
    Ok(())
}

fn leaf(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), GamelistError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

/// Format a rating without trailing zeros (0.9 instead of 0.900000).
fn format_rating(rating: f32) -> String {
    let s = format!("{rating:.6}");
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

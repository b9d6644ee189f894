//! Tolerant reader for platform catalogs (`gamelist.xml`).
//!
//! Known sub-elements land in typed [`GameEntry`] fields; anything outside
//! the known schema is captured verbatim (tag, attributes, raw inner XML)
//! so the writer can re-emit it unchanged.

use std::path::Path;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::entry::{ExtraField, GameEntry};
use crate::error::GamelistError;

/// Parse a catalog file. A missing file is not an error; it yields an
/// empty catalog.
pub fn parse_gamelist(path: &Path) -> Result<Vec<GameEntry>, GamelistError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse a catalog document from a string.
pub fn parse_str(content: &str) -> Result<Vec<GameEntry>, GamelistError> {
    let mut reader = Reader::from_str(content);
    let mut entries = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"game" => {
                match parse_game(&mut reader, &e)? {
                    Some(entry) => entries.push(entry),
                    None => log::warn!("Skipping catalog entry without <path> or <name>"),
                }
            }
            Event::Start(e) if e.name().as_ref() == b"provider" => {
                // Provider block is regenerated on write.
                reader.read_to_end(e.name())?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}

fn parse_game(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
) -> Result<Option<GameEntry>, GamelistError> {
    let mut entry = GameEntry::default();

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == b"id" {
            let value = attr.unescape_value()?.into_owned();
            if !value.is_empty() {
                entry.provider_id = Some(value);
            }
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(child) => {
                let tag = child.name().as_ref().to_vec();
                if is_known_field(&tag) {
                    let raw = reader.read_text(child.name())?;
                    let text = unescape(&raw)
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| raw.into_owned());
                    assign_known(&mut entry, &tag, text.trim());
                } else {
                    let attrs = read_attributes(&child)?;
                    let raw = reader.read_text(child.name())?.into_owned();
                    let empty = raw.is_empty();
                    entry.extra.push(ExtraField {
                        tag: String::from_utf8_lossy(&tag).into_owned(),
                        attrs,
                        raw,
                        empty,
                    });
                }
            }
            Event::Empty(child) => {
                let tag = child.name().as_ref().to_vec();
                if !is_known_field(&tag) {
                    let attrs = read_attributes(&child)?;
                    entry.extra.push(ExtraField {
                        tag: String::from_utf8_lossy(&tag).into_owned(),
                        attrs,
                        raw: String::new(),
                        empty: true,
                    });
                }
            }
            Event::End(e) if e.name().as_ref() == b"game" => break,
            Event::Eof => {
                return Err(GamelistError::malformed("unterminated <game> element"))
            }
            _ => {}
        }
    }

    if entry.path.is_empty() || entry.name.is_empty() {
        return Ok(None);
    }
    Ok(Some(entry))
}

fn read_attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, GamelistError> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        attrs.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            attr.unescape_value()?.into_owned(),
        ));
    }
    Ok(attrs)
}

fn is_known_field(tag: &[u8]) -> bool {
    matches!(
        tag,
        b"path"
            | b"name"
            | b"desc"
            | b"rating"
            | b"releasedate"
            | b"developer"
            | b"publisher"
            | b"genre"
            | b"players"
            | b"image"
            | b"thumbnail"
            | b"marquee"
            | b"video"
            | b"favorite"
            | b"playcount"
            | b"lastplayed"
            | b"hidden"
            | b"kidgame"
    )
}

fn assign_known(entry: &mut GameEntry, tag: &[u8], text: &str) {
    let opt = |t: &str| {
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    };
    match tag {
        b"path" => entry.path = text.to_string(),
        b"name" => entry.name = text.to_string(),
        b"desc" => entry.desc = opt(text),
        b"rating" => entry.rating = text.parse::<f32>().ok(),
        b"releasedate" => entry.releasedate = opt(text),
        b"developer" => entry.developer = opt(text),
        b"publisher" => entry.publisher = opt(text),
        b"genre" => entry.genre = opt(text),
        b"players" => entry.players = opt(text),
        b"image" => entry.image = opt(text),
        b"thumbnail" => entry.thumbnail = opt(text),
        b"marquee" => entry.marquee = opt(text),
        b"video" => entry.video = opt(text),
        b"favorite" => entry.favorite = text.eq_ignore_ascii_case("true"),
        b"playcount" => entry.playcount = text.parse::<u32>().ok(),
        b"lastplayed" => entry.lastplayed = opt(text),
        b"hidden" => entry.hidden = text.eq_ignore_ascii_case("true"),
        b"kidgame" => entry.kidgame = text.eq_ignore_ascii_case("true"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_unknown_fields() {
        let xml = r#"<?xml version="1.0"?>
<gameList>
  <game id="1234" source="ScreenScraper.fr">
    <path>./Game.zip</path>
    <name>Game &amp; Co</name>
    <desc>A fine game.</desc>
    <rating>0.85</rating>
    <favorite>true</favorite>
    <playcount>7</playcount>
    <mycustom>tag</mycustom>
    <altemulator/>
  </game>
</gameList>"#;
        let entries = parse_str(xml).unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.path, "./Game.zip");
        assert_eq!(e.name, "Game & Co");
        assert_eq!(e.provider_id.as_deref(), Some("1234"));
        assert_eq!(e.rating, Some(0.85));
        assert!(e.favorite);
        assert_eq!(e.playcount, Some(7));
        assert_eq!(e.extra.len(), 2);
        assert_eq!(e.extra[0].tag, "mycustom");
        assert_eq!(e.extra[0].raw, "tag");
        assert!(e.extra[1].empty);
    }

    #[test]
    fn entry_without_path_is_skipped() {
        let xml = r#"<gameList>
  <game><name>No Path</name></game>
  <game><path>./Ok.zip</path><name>Ok</name></game>
</gameList>"#;
        let entries = parse_str(xml).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Ok");
    }

    #[test]
    fn provider_block_is_ignored() {
        let xml = r#"<gameList>
  <provider><System>nes</System><software>curateur</software></provider>
  <game><path>./A.nes</path><name>A</name></game>
</gameList>"#;
        let entries = parse_str(xml).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_file_yields_empty_catalog() {
        let entries = parse_gamelist(Path::new("/nonexistent/gamelist.xml")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn unknown_structured_element_keeps_raw_markup() {
        let xml = r#"<gameList>
  <game>
    <path>./A.nes</path>
    <name>A</name>
    <scores><best user="x">99</best></scores>
  </game>
</gameList>"#;
        let entries = parse_str(xml).unwrap();
        let extra = &entries[0].extra[0];
        assert_eq!(extra.tag, "scores");
        assert_eq!(extra.raw, r#"<best user="x">99</best>"#);
        assert!(!extra.empty);
    }
}

//! Catalog round-trip: parse(serialize(C)) == C, unknown fields included.

use curateur_gamelist::entry::{ExtraField, GameEntry};
use curateur_gamelist::merge::{merge_entries, MergePolicy};
use curateur_gamelist::parser::parse_str;
use curateur_gamelist::writer::render;

fn full_entry() -> GameEntry {
    GameEntry {
        path: "./Sample Saga.m3u".into(),
        name: "Sample Saga".into(),
        provider_id: Some("777".into()),
        desc: Some("Two discs of adventure & mystery.".into()),
        rating: Some(0.85),
        releasedate: Some("19981104T000000".into()),
        developer: Some("Saga Works".into()),
        publisher: Some("Saga <Intl>".into()),
        genre: Some("RPG-Adventure".into()),
        players: Some("1".into()),
        image: Some("./media/screenshots/Sample Saga.png".into()),
        marquee: Some("./media/marquees/Sample Saga.png".into()),
        favorite: true,
        playcount: Some(42),
        lastplayed: Some("20260501T200000".into()),
        hidden: false,
        kidgame: true,
        extra: vec![
            ExtraField {
                tag: "sortname".into(),
                attrs: vec![],
                raw: "Saga, Sample".into(),
                empty: false,
            },
            ExtraField {
                tag: "altemulator".into(),
                attrs: vec![("label".into(), "beetle".into())],
                raw: String::new(),
                empty: true,
            },
            ExtraField {
                tag: "scores".into(),
                attrs: vec![],
                raw: "<best user=\"me\">99</best>".into(),
                empty: false,
            },
        ],
        ..Default::default()
    }
}

#[test]
fn parse_of_render_is_identity() {
    let entries = vec![full_entry(), GameEntry::new("./Other.zip", "Other")];
    let xml = render("psx", &entries).unwrap();
    let reparsed = parse_str(&xml).unwrap();
    assert_eq!(reparsed, entries);
}

#[test]
fn double_render_is_byte_identical() {
    let entries = vec![full_entry()];
    let first = render("psx", &entries).unwrap();
    let reparsed = parse_str(&first).unwrap();
    let second = render("psx", &reparsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn merge_then_write_preserves_user_edits_and_unknowns() {
    // Rerun scenario: provider returns an updated description; the
    // favorite flag and a custom tag must survive byte-for-byte.
    let existing_xml = r#"<?xml version="1.0"?>
<gameList>
  <game id="777" source="ScreenScraper.fr">
    <path>./Game.zip</path>
    <name>Game</name>
    <desc>Old words.</desc>
    <favorite>true</favorite>
    <mycustom>tag</mycustom>
  </game>
</gameList>"#;
    let existing = parse_str(existing_xml).unwrap();

    let mut scraped = GameEntry::new("./Game.zip", "Game");
    scraped.provider_id = Some("777".into());
    scraped.desc = Some("New words.".into());

    let (merged, report) =
        merge_entries(Some(&existing[0]), &scraped, MergePolicy::PreserveUserEdits);
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].field, "desc");

    let xml = render("nes", &[merged]).unwrap();
    assert!(xml.contains("<desc>New words.</desc>"));
    assert!(xml.contains("<favorite>true</favorite>"));
    assert!(xml.contains("<mycustom>tag</mycustom>"));
}

//! Provider response model.
//!
//! The wire shapes (`Jeu`, `UserInfo`, ...) mirror the Provider's JSON
//! payloads, which index names by region and descriptions by language as
//! nested arrays. [`GameRecord`] is the engine-facing record built from
//! them at the client boundary; dynamic shapes do not leak past it.

use serde::{Deserialize, Serialize};

// ---- Wire shapes -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct JeuInfosResponse {
    pub response: JeuInfosData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JeuInfosData {
    #[serde(default)]
    pub ssuser: Option<UserQuota>,
    pub jeu: Jeu,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JeuRechercheResponse {
    pub response: JeuRechercheData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JeuRechercheData {
    #[serde(default)]
    pub ssuser: Option<UserQuota>,
    #[serde(default)]
    pub jeux: Vec<Jeu>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct Jeu {
    pub id: String,
    #[serde(default)]
    pub noms: Vec<WireRegionText>,
    #[serde(default)]
    pub synopsis: Vec<WireLangText>,
    #[serde(default)]
    pub dates: Vec<WireRegionText>,
    #[serde(default)]
    pub medias: Vec<WireMedia>,
    #[serde(default)]
    pub editeur: Option<IdText>,
    #[serde(default)]
    pub developpeur: Option<IdText>,
    #[serde(default)]
    pub joueurs: Option<IdText>,
    #[serde(default)]
    pub note: Option<IdText>,
    #[serde(default)]
    pub genres: Vec<WireGenre>,
    #[serde(default)]
    pub rom: Option<WireRom>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireRegionText {
    #[serde(default)]
    pub region: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireLangText {
    #[serde(default)]
    pub langue: String,
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct IdText {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireMedia {
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub crc: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireGenre {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub principale: Option<String>,
    #[serde(default)]
    pub noms: Vec<WireLangText>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct WireRom {
    #[serde(default)]
    pub romsize: Option<String>,
}

// ---- Engine-facing record --------------------------------------------------

/// Text indexed by Provider region code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionText {
    pub region: String,
    pub text: String,
}

/// Text indexed by Provider language code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageText {
    pub language: String,
    pub text: String,
}

/// One media asset offered by the Provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub media_type: String,
    pub region: String,
    pub url: String,
    pub format: String,
    pub size: Option<u64>,
    pub crc: Option<String>,
}

/// One game's worth of Provider data, normalized at the client boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameRecord {
    pub id: String,
    pub names: Vec<RegionText>,
    pub synopses: Vec<LanguageText>,
    pub dates: Vec<RegionText>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub players: Option<String>,
    /// Rating normalized from the Provider's 0-20 scale to 0.0-1.0.
    pub rating: Option<f32>,
    /// Primary genre names, deduplicated by Provider genre ID.
    pub genres: Vec<String>,
    pub medias: Vec<MediaItem>,
    /// Provider-reported ROM size, for match scoring.
    pub rom_size: Option<u64>,
}

impl GameRecord {
    pub(crate) fn from_wire(jeu: &Jeu, preferred_language: &str) -> Self {
        let names = jeu
            .noms
            .iter()
            .map(|n| RegionText {
                region: n.region.clone(),
                text: decode_entities(&n.text),
            })
            .collect();
        let synopses = jeu
            .synopsis
            .iter()
            .map(|s| LanguageText {
                language: s.langue.clone(),
                text: decode_entities(&s.text),
            })
            .collect();
        let dates = jeu
            .dates
            .iter()
            .map(|d| RegionText {
                region: d.region.clone(),
                text: d.text.clone(),
            })
            .collect();
        let medias = jeu
            .medias
            .iter()
            .map(|m| MediaItem {
                media_type: m.media_type.clone(),
                region: m.region.clone(),
                url: m.url.clone(),
                format: m.format.clone(),
                size: m.size.as_deref().and_then(|s| s.parse().ok()),
                crc: m.crc.clone(),
            })
            .collect();

        Self {
            id: jeu.id.clone(),
            names,
            synopses,
            dates,
            developer: jeu.developpeur.as_ref().map(|d| decode_entities(&d.text)),
            publisher: jeu.editeur.as_ref().map(|p| decode_entities(&p.text)),
            players: jeu.joueurs.as_ref().map(|j| j.text.clone()),
            rating: jeu.note.as_ref().and_then(|n| {
                n.text
                    .parse::<f32>()
                    .ok()
                    .map(|v| (v / 20.0).clamp(0.0, 1.0))
            }),
            genres: collect_genres(&jeu.genres, preferred_language),
            medias,
            rom_size: jeu
                .rom
                .as_ref()
                .and_then(|r| r.romsize.as_deref())
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Game name for a preferred region chain, falling back to the
    /// Provider's own name and finally the first available.
    pub fn name_for_regions(&self, preferred: &[&str]) -> Option<&str> {
        for code in preferred {
            if let Some(n) = self.names.iter().find(|n| n.region == *code) {
                return Some(&n.text);
            }
        }
        self.names
            .iter()
            .find(|n| n.region == "ss")
            .or_else(|| self.names.first())
            .map(|n| n.text.as_str())
    }

    /// Synopsis for a preferred language chain.
    pub fn synopsis_for_languages(&self, preferred: &[&str]) -> Option<&str> {
        for code in preferred {
            if let Some(s) = self.synopses.iter().find(|s| s.language == *code) {
                return Some(&s.text);
            }
        }
        None
    }

    /// Release date for a preferred region chain, falling back to the
    /// first available.
    pub fn date_for_regions(&self, preferred: &[&str]) -> Option<&str> {
        for code in preferred {
            if let Some(d) = self.dates.iter().find(|d| d.region == *code) {
                return Some(&d.text);
            }
        }
        self.dates.first().map(|d| d.text.as_str())
    }
}

/// Primary genres only, preferred language first with English fallback,
/// deduplicated by Provider genre ID.
fn collect_genres(genres: &[WireGenre], preferred_language: &str) -> Vec<String> {
    let pick = |language: &str| -> Vec<String> {
        let mut seen = Vec::new();
        let mut names = Vec::new();
        for genre in genres {
            if genre.principale.as_deref() != Some("1") {
                continue;
            }
            let id = genre.id.clone().unwrap_or_default();
            if seen.contains(&id) {
                continue;
            }
            if let Some(n) = genre.noms.iter().find(|n| n.langue == language) {
                seen.push(id);
                names.push(decode_entities(&n.text));
            }
        }
        names
    };

    let preferred = pick(preferred_language);
    if !preferred.is_empty() {
        return preferred;
    }
    pick("en")
}

fn decode_entities(text: &str) -> String {
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

// ---- Account info ----------------------------------------------------------

/// Account info from the authentication endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    pub response: UserInfoData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoData {
    pub ssuser: UserInfo,
}

/// Server-reported account limits. Numeric fields arrive as strings.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub maxthreads: Option<String>,
    #[serde(default)]
    pub requeststoday: Option<String>,
    #[serde(default)]
    pub maxrequestspermin: Option<String>,
    #[serde(default)]
    pub maxrequestsperday: Option<String>,
}

impl UserInfo {
    pub fn requests_today(&self) -> u32 {
        parse_or(&self.requeststoday, 0)
    }

    pub fn max_requests_per_day(&self) -> u32 {
        parse_or(&self.maxrequestsperday, 20000)
    }

    pub fn max_requests_per_min(&self) -> Option<u32> {
        self.maxrequestspermin.as_ref().and_then(|s| s.parse().ok())
    }

    pub fn max_threads(&self) -> u32 {
        parse_or(&self.maxthreads, 1)
    }
}

/// Quota info embedded in lookup responses.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct UserQuota {
    #[serde(default)]
    pub requeststoday: Option<String>,
    #[serde(default)]
    pub maxrequestsperday: Option<String>,
}

impl UserQuota {
    pub fn requests_today(&self) -> u32 {
        parse_or(&self.requeststoday, 0)
    }

    pub fn max_requests_per_day(&self) -> u32 {
        parse_or(&self.maxrequestsperday, 20000)
    }
}

fn parse_or(value: &Option<String>, fallback: u32) -> u32 {
    value
        .as_ref()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

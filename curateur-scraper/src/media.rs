//! Media selection, download, and validation.
//!
//! For each enabled media type the Provider offers, exactly one asset is
//! chosen: candidates are bucketed by region priority (ROM's declared
//! regions first, then the configured preference order) and the first
//! candidate of the first non-empty bucket wins. Downloads stream to a
//! sibling temp file, are validated, content-hashed, and renamed into the
//! platform's media tree.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::time::Duration;

use curateur_core::{Language, Region};

use crate::error::ScrapeError;
use crate::types::{GameRecord, MediaItem};

/// Minimum plausible size for any downloaded asset.
const MIN_MEDIA_SIZE: u64 = 64;

/// Closed set of media types the engine recognizes, mapping Provider
/// media codes to the frontend's directory layout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum MediaKind {
    /// Front box art (`box-2D`)
    Cover,
    /// 3D rendered box art (`box-3D`)
    Box3d,
    /// In-game screenshot (`ss`)
    Screenshot,
    /// Title screen capture (`sstitle`)
    TitleScreen,
    /// Logo / marquee (`screenmarquee`)
    Marquee,
    /// Fan artwork (`fanart`)
    Fanart,
    /// Gameplay video (`video`)
    Video,
    /// Scanned manual (`manuel`)
    Manual,
}

impl MediaKind {
    pub const ALL: [MediaKind; 8] = [
        MediaKind::Cover,
        MediaKind::Box3d,
        MediaKind::Screenshot,
        MediaKind::TitleScreen,
        MediaKind::Marquee,
        MediaKind::Fanart,
        MediaKind::Video,
        MediaKind::Manual,
    ];

    /// The Provider's media type code.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Self::Cover => "box-2D",
            Self::Box3d => "box-3D",
            Self::Screenshot => "ss",
            Self::TitleScreen => "sstitle",
            Self::Marquee => "screenmarquee",
            Self::Fanart => "fanart",
            Self::Video => "video",
            Self::Manual => "manuel",
        }
    }

    /// Alternate Provider codes accepted when the primary has no asset.
    fn fallback_codes(&self) -> &'static [&'static str] {
        match self {
            Self::Marquee => &["wheel"],
            Self::Video => &["video-normalized"],
            _ => &[],
        }
    }

    /// Frontend media directory name.
    pub fn directory(&self) -> &'static str {
        match self {
            Self::Cover => "covers",
            Self::Box3d => "3dboxes",
            Self::Screenshot => "screenshots",
            Self::TitleScreen => "titlescreens",
            Self::Marquee => "marquees",
            Self::Fanart => "fanart",
            Self::Video => "videos",
            Self::Manual => "manuals",
        }
    }

    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Manual => "pdf",
            _ => "png",
        }
    }

    /// Extensions a pre-existing file of this type may carry on disk.
    pub fn known_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => &["mp4", "avi", "mkv"],
            Self::Manual => &["pdf"],
            _ => &["png", "jpg", "jpeg"],
        }
    }

    /// Region filtering is skipped for types without regional variants.
    pub fn is_regionless(&self) -> bool {
        matches!(self, Self::Fanart | Self::Video)
    }

    /// Whether the asset is selected by language rather than region.
    pub fn is_language_bearing(&self) -> bool {
        matches!(self, Self::Manual)
    }

    /// Whether image validation applies.
    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Video | Self::Manual)
    }

    /// Parse a configuration name (directory names and a few aliases).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "covers" | "cover" | "box2d" => Some(Self::Cover),
            "3dboxes" | "3dbox" | "box3d" => Some(Self::Box3d),
            "screenshots" | "screenshot" => Some(Self::Screenshot),
            "titlescreens" | "titlescreen" => Some(Self::TitleScreen),
            "marquees" | "marquee" => Some(Self::Marquee),
            "fanart" => Some(Self::Fanart),
            "videos" | "video" => Some(Self::Video),
            "manuals" | "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.directory())
    }
}

/// Pick the one asset to fetch for a media type, or `None` when the
/// Provider offers nothing usable.
pub fn select_asset<'a>(
    record: &'a GameRecord,
    kind: MediaKind,
    rom_regions: &[Region],
    preferred_regions: &[Region],
    preferred_languages: &[Language],
) -> Option<&'a MediaItem> {
    let candidates: Vec<&MediaItem> = std::iter::once(kind.provider_code())
        .chain(kind.fallback_codes().iter().copied())
        .flat_map(|code| record.medias.iter().filter(move |m| m.media_type == code))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    if kind.is_regionless() {
        return candidates.first().copied();
    }

    if kind.is_language_bearing() {
        for language in preferred_languages {
            if let Some(item) = candidates
                .iter()
                .find(|m| m.region == language.provider_code())
            {
                return Some(item);
            }
        }
        return candidates.first().copied();
    }

    // ROM's declared regions first (in ROM order), then configured
    // preferences, skipping regions already covered.
    let mut priority: Vec<Region> = Vec::new();
    for &region in rom_regions.iter().chain(preferred_regions.iter()) {
        if !priority.contains(&region) {
            priority.push(region);
        }
    }

    for region in &priority {
        if let Some(item) = candidates
            .iter()
            .find(|m| m.region == region.provider_code())
        {
            return Some(item);
        }
    }

    candidates.first().copied()
}

/// Final media path: `<media_root>/<platform>/<type_dir>/<basename>.<ext>`.
pub fn media_dest(
    media_root: &Path,
    platform: &str,
    kind: MediaKind,
    basename: &str,
    item_format: &str,
) -> PathBuf {
    let ext = if item_format.is_empty() {
        kind.default_extension()
    } else {
        item_format
    };
    media_root
        .join(platform)
        .join(kind.directory())
        .join(format!("{basename}.{ext}"))
}

/// Locate a pre-existing file for (ROM, type), trying each known extension.
pub fn existing_media_path(
    media_root: &Path,
    platform: &str,
    kind: MediaKind,
    basename: &str,
) -> Option<PathBuf> {
    let dir = media_root.join(platform).join(kind.directory());
    for ext in kind.known_extensions() {
        let candidate = dir.join(format!("{basename}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Compute the CRC32 content hash of a file on disk (uppercase hex).
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    use std::io::Read;
    let mut file = std::fs::File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:08X}", hasher.finalize()))
}

/// Image validation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaValidation {
    Disabled,
    #[default]
    Normal,
    Strict,
}

/// A media file successfully placed into the media tree.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub path: PathBuf,
    /// CRC32 of the downloaded bytes, uppercase hex.
    pub hash: String,
    pub size: u64,
}

/// Streams assets from the Provider CDN over the shared pooled transport.
pub struct MediaFetcher {
    http: reqwest::Client,
    timeout: Duration,
    validation: MediaValidation,
    min_image_side: u32,
}

impl MediaFetcher {
    pub fn new(
        http: reqwest::Client,
        timeout: Duration,
        validation: MediaValidation,
        min_image_side: u32,
    ) -> Self {
        Self {
            http,
            timeout,
            validation,
            min_image_side,
        }
    }

    /// Download `url` into `dest`: stream to a sibling temp file, validate,
    /// hash, then rename. On any failure the temp file is discarded and
    /// `dest` is left untouched.
    pub async fn fetch(
        &self,
        url: &str,
        kind: MediaKind,
        dest: &Path,
    ) -> Result<FetchedMedia, ScrapeError> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = sibling_temp(dest);

        let result = tokio::time::timeout(self.timeout, self.stream_to(url, &tmp)).await;
        let (size, hash, head) = match result {
            Ok(Ok(streamed)) => streamed,
            Ok(Err(e)) => {
                discard(&tmp);
                return Err(e);
            }
            Err(_) => {
                discard(&tmp);
                return Err(ScrapeError::Timeout(self.timeout.as_secs()));
            }
        };

        if let Err(e) = self.validate(kind, size, &head, &tmp) {
            discard(&tmp);
            return Err(e);
        }

        std::fs::rename(&tmp, dest)?;
        Ok(FetchedMedia {
            path: dest.to_path_buf(),
            hash,
            size,
        })
    }

    async fn stream_to(
        &self,
        url: &str,
        tmp: &Path,
    ) -> Result<(u64, String, Vec<u8>), ScrapeError> {
        let mut resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::ServerError {
                status: status.as_u16(),
                message: format!("media download returned HTTP {}", status.as_u16()),
            });
        }

        let mut file = tokio::fs::File::create(tmp).await?;
        let mut hasher = crc32fast::Hasher::new();
        let mut size = 0u64;
        let mut head: Vec<u8> = Vec::new();

        while let Some(chunk) = resp.chunk().await? {
            hasher.update(&chunk);
            size += chunk.len() as u64;
            if head.len() < 8192 {
                let take = chunk.len().min(8192 - head.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;

        Ok((size, format!("{:08X}", hasher.finalize()), head))
    }

    fn validate(
        &self,
        kind: MediaKind,
        size: u64,
        head: &[u8],
        tmp: &Path,
    ) -> Result<(), ScrapeError> {
        if size < MIN_MEDIA_SIZE {
            return Err(ScrapeError::MediaValidation(format!(
                "file too small ({size} bytes)"
            )));
        }
        if self.validation == MediaValidation::Disabled || !kind.is_image() {
            return Ok(());
        }

        image::guess_format(head)
            .map_err(|_| ScrapeError::MediaValidation("not a recognizable image".to_string()))?;

        if self.validation == MediaValidation::Strict {
            use image::GenericImageView;
            let bytes = std::fs::read(tmp)?;
            let img = image::load_from_memory(&bytes).map_err(|e| {
                ScrapeError::MediaValidation(format!("image failed to decode: {e}"))
            })?;
            let (width, height) = img.dimensions();
            if width < self.min_image_side || height < self.min_image_side {
                return Err(ScrapeError::MediaValidation(format!(
                    "image {width}x{height} below minimum side {}",
                    self.min_image_side
                )));
            }
        }
        Ok(())
    }
}

fn sibling_temp(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string());
    name.push_str(".part");
    dest.with_file_name(name)
}

fn discard(tmp: &Path) {
    let _ = std::fs::remove_file(tmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(media_type: &str, region: &str, url: &str) -> MediaItem {
        MediaItem {
            media_type: media_type.into(),
            region: region.into(),
            url: url.into(),
            format: "png".into(),
            size: None,
            crc: None,
        }
    }

    fn record_with(medias: Vec<MediaItem>) -> GameRecord {
        GameRecord {
            id: "1".into(),
            medias,
            ..Default::default()
        }
    }

    #[test]
    fn rom_region_outranks_config_preference() {
        let record = record_with(vec![
            item("box-2D", "us", "http://cdn/us.png"),
            item("box-2D", "jp", "http://cdn/jp.png"),
        ]);
        let chosen = select_asset(
            &record,
            MediaKind::Cover,
            &[Region::Japan],
            &[Region::Usa, Region::Europe],
            &[],
        )
        .unwrap();
        assert_eq!(chosen.url, "http://cdn/jp.png");
    }

    #[test]
    fn config_order_applies_without_rom_regions() {
        let record = record_with(vec![
            item("box-2D", "jp", "http://cdn/jp.png"),
            item("box-2D", "eu", "http://cdn/eu.png"),
        ]);
        let chosen = select_asset(
            &record,
            MediaKind::Cover,
            &[],
            &[Region::Usa, Region::Europe, Region::Japan],
            &[],
        )
        .unwrap();
        assert_eq!(chosen.url, "http://cdn/eu.png");
    }

    #[test]
    fn regionless_types_take_first_candidate() {
        let record = record_with(vec![
            item("video", "jp", "http://cdn/first.mp4"),
            item("video", "us", "http://cdn/second.mp4"),
        ]);
        let chosen = select_asset(
            &record,
            MediaKind::Video,
            &[Region::Usa],
            &[Region::Usa],
            &[],
        )
        .unwrap();
        assert_eq!(chosen.url, "http://cdn/first.mp4");
    }

    #[test]
    fn marquee_falls_back_to_wheel() {
        let record = record_with(vec![item("wheel", "us", "http://cdn/wheel.png")]);
        let chosen =
            select_asset(&record, MediaKind::Marquee, &[], &[Region::Usa], &[]).unwrap();
        assert_eq!(chosen.url, "http://cdn/wheel.png");
    }

    #[test]
    fn manual_selected_by_language() {
        let record = record_with(vec![
            item("manuel", "de", "http://cdn/de.pdf"),
            item("manuel", "en", "http://cdn/en.pdf"),
        ]);
        let chosen = select_asset(
            &record,
            MediaKind::Manual,
            &[],
            &[],
            &[Language::English, Language::German],
        )
        .unwrap();
        assert_eq!(chosen.url, "http://cdn/en.pdf");
    }

    #[test]
    fn no_candidates_yields_none() {
        let record = record_with(vec![]);
        assert!(select_asset(&record, MediaKind::Cover, &[], &[], &[]).is_none());
    }

    #[test]
    fn dest_layout_matches_frontend() {
        let dest = media_dest(
            Path::new("/media"),
            "nes",
            MediaKind::Cover,
            "World Explorer (World)",
            "jpg",
        );
        assert_eq!(
            dest,
            PathBuf::from("/media/nes/covers/World Explorer (World).jpg")
        );
        // Empty Provider format falls back to the type default.
        let dest = media_dest(Path::new("/media"), "nes", MediaKind::Screenshot, "X", "");
        assert_eq!(dest, PathBuf::from("/media/nes/screenshots/X.png"));
    }

    #[test]
    fn existing_media_found_across_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let covers = dir.path().join("nes").join("covers");
        std::fs::create_dir_all(&covers).unwrap();
        std::fs::write(covers.join("Game.jpg"), vec![0u8; 100]).unwrap();

        assert!(existing_media_path(dir.path(), "nes", MediaKind::Cover, "Game").is_some());
        assert!(existing_media_path(dir.path(), "nes", MediaKind::Cover, "Other").is_none());
    }

    #[test]
    fn config_names_parse() {
        assert_eq!(MediaKind::from_name("covers"), Some(MediaKind::Cover));
        assert_eq!(MediaKind::from_name("videos"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_name("bogus"), None);
    }
}

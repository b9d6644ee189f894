//! Platform model and platform-index reader.
//!
//! The platform index is the frontend-maintained `es_systems.xml` listing.
//! The engine reads it to learn each platform's identifier, display name,
//! ROM path macro, and accepted extensions; it never writes the file.

use std::path::{Path, PathBuf};

use quick_xml::escape::unescape;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::CoreError;
use crate::systems::provider_system_id;

/// One scraping-scoped platform resolved from the platform index.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Frontend identifier (e.g., `nes`), also the media/catalog directory name.
    pub name: String,
    /// Human-readable full name.
    pub fullname: String,
    /// Resolved ROM directory for this platform.
    pub rom_dir: PathBuf,
    /// Accepted extensions, lowercase with leading dot (e.g., `.nes`, `.zip`).
    pub extensions: Vec<String>,
    /// Provider system ID, when the platform is known to the Provider.
    pub provider_id: Option<u32>,
}

impl Platform {
    /// Whether `filename` carries one of this platform's accepted extensions.
    pub fn accepts(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}

/// The parsed platform index.
#[derive(Debug, Clone, Default)]
pub struct PlatformIndex {
    pub platforms: Vec<Platform>,
}

impl PlatformIndex {
    /// Load and parse the platform index, resolving `%ROMPATH%` macros
    /// against `rom_root`.
    pub fn load(index_path: &Path, rom_root: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(index_path)?;
        Self::parse(&content, rom_root)
    }

    /// Parse an index document from a string.
    pub fn parse(content: &str, rom_root: &Path) -> Result<Self, CoreError> {
        let mut reader = Reader::from_str(content);
        let mut platforms = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) if e.name().as_ref() == b"systemList" => {
                    saw_root = true;
                }
                Event::Start(e) if e.name().as_ref() == b"system" => {
                    if let Some(platform) = parse_system(&mut reader, rom_root)? {
                        platforms.push(platform);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(CoreError::invalid_index(
                "missing <systemList> root element",
            ));
        }

        Ok(Self { platforms })
    }

    /// Platforms filtered by an operator selection; an empty selection
    /// means all platforms.
    pub fn select(&self, selection: &[String]) -> Vec<Platform> {
        if selection.is_empty() {
            return self.platforms.clone();
        }
        self.platforms
            .iter()
            .filter(|p| selection.iter().any(|s| s == &p.name))
            .cloned()
            .collect()
    }
}

fn parse_system(
    reader: &mut Reader<&[u8]>,
    rom_root: &Path,
) -> Result<Option<Platform>, CoreError> {
    let mut name = None;
    let mut fullname = None;
    let mut path_macro = None;
    let mut extension = None;
    let mut platform_tag = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let tag = e.name().as_ref().to_vec();
                let raw = reader.read_text(e.name())?;
                let text = unescape(&raw)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| raw.into_owned());
                let text = text.trim().to_string();
                match tag.as_slice() {
                    b"name" => name = Some(text),
                    b"fullname" => fullname = Some(text),
                    b"path" => path_macro = Some(text),
                    b"extension" => extension = Some(text),
                    b"platform" => platform_tag = Some(text),
                    _ => {}
                }
            }
            Event::End(e) if e.name().as_ref() == b"system" => break,
            Event::Eof => {
                return Err(CoreError::invalid_index("unterminated <system> element"))
            }
            _ => {}
        }
    }

    let Some(name) = name.filter(|n| !n.is_empty()) else {
        log::warn!("Platform index entry without <name>, skipping");
        return Ok(None);
    };
    let Some(path_macro) = path_macro.filter(|p| !p.is_empty()) else {
        log::warn!("Platform '{name}' has no <path>, skipping");
        return Ok(None);
    };

    let rom_dir = resolve_rom_path(&path_macro, rom_root);
    let extensions = extension
        .unwrap_or_default()
        .split_whitespace()
        .map(|e| {
            let e = e.to_lowercase();
            if e.starts_with('.') {
                e
            } else {
                format!(".{e}")
            }
        })
        .collect::<Vec<_>>();

    if extensions.is_empty() {
        log::warn!("Platform '{name}' declares no extensions, skipping");
        return Ok(None);
    }

    let provider_key = platform_tag.as_deref().unwrap_or(&name);
    let provider_id =
        provider_system_id(provider_key).or_else(|| provider_system_id(&name));

    Ok(Some(Platform {
        fullname: fullname.unwrap_or_else(|| name.clone()),
        name,
        rom_dir,
        extensions,
        provider_id,
    }))
}

/// Resolve a `%ROMPATH%` macro or a leading `~` to a concrete directory.
///
/// A bare `~` or `~/...` expands against the user's home directory;
/// `~user` forms pass through verbatim, as does everything else.
fn resolve_rom_path(path_macro: &str, rom_root: &Path) -> PathBuf {
    if let Some(rest) = path_macro.strip_prefix("%ROMPATH%") {
        let rest = rest.trim_start_matches(['/', '\\']);
        return rom_root.join(rest);
    }
    if path_macro == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path_macro
        .strip_prefix("~/")
        .or_else(|| path_macro.strip_prefix("~\\"))
    {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path_macro)
}

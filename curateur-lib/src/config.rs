//! Typed run configuration.
//!
//! The recognized option surface; loaded from a TOML file with serde
//! defaults, validated once before the run starts.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use curateur_core::{HashAlgorithm, Language, Region};
use curateur_gamelist::MergePolicy;
use curateur_scraper::{MediaKind, MediaValidation};

use crate::error::EngineError;

/// When provider-owned data is refreshed for ROMs already in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    Never,
    #[default]
    ChangedOnly,
    Always,
}

/// Name-verification strictness for direct matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameVerification {
    Strict,
    #[default]
    Normal,
    Lenient,
    Disabled,
}

impl NameVerification {
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Strict => 0.8,
            Self::Normal => 0.6,
            Self::Lenient => 0.4,
            Self::Disabled => 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PathsConfig {
    pub rom_root: PathBuf,
    pub media_root: PathBuf,
    pub catalog_root: PathBuf,
    pub platform_index: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PlatformsConfig {
    /// Allowlist of platform identifiers; empty means all.
    pub selection: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub enabled_types: Vec<String>,
    pub validation: MediaValidation,
    pub skip_existing_media: bool,
    pub min_image_side: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled_types: vec![
                "covers".to_string(),
                "screenshots".to_string(),
                "titlescreens".to_string(),
                "marquees".to_string(),
            ],
            validation: MediaValidation::Normal,
            skip_existing_media: false,
            min_image_side: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    pub update_policy: UpdatePolicy,
    pub skip_scraped: bool,
    pub merge_policy: String,
    pub integrity_threshold: f64,
    pub name_verification: NameVerification,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::ChangedOnly,
            skip_scraped: true,
            merge_policy: "preserve_user_edits".to_string(),
            integrity_threshold: 0.95,
            name_verification: NameVerification::Normal,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enable_fallback: bool,
    pub threshold: f64,
    pub max_results: usize,
    pub interactive: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enable_fallback: true,
            threshold: 0.7,
            max_results: 10,
            interactive: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ApiOverrides {
    /// Operator caps; always lower-bounded by the Provider's own caps.
    pub max_workers: Option<u32>,
    pub requests_per_minute: Option<u32>,
    pub daily_quota: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub request_timeout_s: u64,
    pub max_retries: u32,
    pub initial_retry_delay_s: u64,
    pub quota_warning_ratio: f64,
    pub r#override: ApiOverrides,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            request_timeout_s: 30,
            max_retries: 3,
            initial_retry_delay_s: 2,
            quota_warning_ratio: 0.95,
            r#override: ApiOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub hash_algorithm: HashAlgorithm,
    pub hash_size_cap_bytes: u64,
    /// Scan, hash, evaluate, and look up — but write nothing.
    pub dry_run: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::Crc32,
            hash_size_cap_bytes: 1 << 30,
            dry_run: false,
        }
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub paths: PathsConfig,
    pub platforms: PlatformsConfig,
    /// Region preference order (Provider codes, e.g. `us`, `wor`).
    pub regions: Vec<String>,
    /// Language preference order (Provider codes, e.g. `en`).
    pub languages: Vec<String>,
    pub media: MediaConfig,
    pub scraping: ScrapingConfig,
    pub search: SearchConfig,
    pub api: ApiConfig,
    pub runtime: RuntimeConfig,
}

impl RunConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| EngineError::config(format!("{}: {e}", path.display())))?;
        Ok(config)
    }

    /// Validate ranges, closed sets, and required paths.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, path) in [
            ("paths.rom_root", &self.paths.rom_root),
            ("paths.media_root", &self.paths.media_root),
            ("paths.catalog_root", &self.paths.catalog_root),
            ("paths.platform_index", &self.paths.platform_index),
        ] {
            if path.as_os_str().is_empty() {
                return Err(EngineError::config(format!("{name} is required")));
            }
        }

        if !(0.0..=1.0).contains(&self.scraping.integrity_threshold) {
            return Err(EngineError::config(
                "scraping.integrity_threshold must be within 0.0-1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(EngineError::config("search.threshold must be within 0.0-1.0"));
        }
        if !(0.0..=1.0).contains(&self.api.quota_warning_ratio) {
            return Err(EngineError::config(
                "api.quota_warning_ratio must be within 0.0-1.0",
            ));
        }

        // Operator overrides only lower the Provider caps; zero would stall
        // the run entirely.
        if self.api.r#override.max_workers == Some(0) {
            return Err(EngineError::config(
                "api.override.max_workers must be at least 1",
            ));
        }
        if self.api.r#override.requests_per_minute == Some(0) {
            return Err(EngineError::config(
                "api.override.requests_per_minute must be at least 1",
            ));
        }
        if self.api.r#override.daily_quota == Some(0) {
            return Err(EngineError::config(
                "api.override.daily_quota must be at least 1",
            ));
        }

        if MergePolicy::from_name(&self.scraping.merge_policy).is_none() {
            return Err(EngineError::config(format!(
                "unknown scraping.merge_policy '{}'",
                self.scraping.merge_policy
            )));
        }

        for name in &self.media.enabled_types {
            if MediaKind::from_name(name).is_none() {
                return Err(EngineError::config(format!(
                    "unknown media type '{name}' in media.enabled_types"
                )));
            }
        }
        for code in &self.regions {
            if Region::from_provider_code(code).is_none() {
                return Err(EngineError::config(format!("unknown region code '{code}'")));
            }
        }
        for code in &self.languages {
            if Language::from_provider_code(code).is_none() {
                return Err(EngineError::config(format!(
                    "unknown language code '{code}'"
                )));
            }
        }

        Ok(())
    }

    /// Region preference order; defaults to us, wor, eu, jp.
    pub fn preferred_regions(&self) -> Vec<Region> {
        if self.regions.is_empty() {
            return vec![Region::Usa, Region::World, Region::Europe, Region::Japan];
        }
        self.regions
            .iter()
            .filter_map(|c| Region::from_provider_code(c))
            .collect()
    }

    /// Language preference order; defaults to English.
    pub fn preferred_languages(&self) -> Vec<Language> {
        if self.languages.is_empty() {
            return vec![Language::English];
        }
        self.languages
            .iter()
            .filter_map(|c| Language::from_provider_code(c))
            .collect()
    }

    /// Enabled media types, in configuration order.
    pub fn enabled_media(&self) -> Vec<MediaKind> {
        self.media
            .enabled_types
            .iter()
            .filter_map(|n| MediaKind::from_name(n))
            .collect()
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::from_name(&self.scraping.merge_policy).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = RunConfig::default();
        assert_eq!(config.scraping.update_policy, UpdatePolicy::ChangedOnly);
        assert!(config.scraping.skip_scraped);
        assert_eq!(config.scraping.integrity_threshold, 0.95);
        assert_eq!(config.api.max_retries, 3);
        assert_eq!(config.runtime.hash_size_cap_bytes, 1 << 30);
        assert_eq!(config.enabled_media().len(), 4);
        assert_eq!(
            config.preferred_regions(),
            vec![Region::Usa, Region::World, Region::Europe, Region::Japan]
        );
    }

    #[test]
    fn parses_full_document() {
        let toml = r#"
[paths]
rom_root = "/roms"
media_root = "/media"
catalog_root = "/catalogs"
platform_index = "/etc/es_systems.xml"

[platforms]
selection = ["nes", "psx"]

regions = ["eu", "us"]
languages = ["fr", "en"]

[media]
enabled_types = ["covers", "videos"]
validation = "strict"
skip_existing_media = true
min_image_side = 128

[scraping]
update_policy = "always"
skip_scraped = false
name_verification = "lenient"

[search]
enable_fallback = false
threshold = 0.9

[api]
request_timeout_s = 15
max_retries = 5

[api.override]
max_workers = 2
requests_per_minute = 30
daily_quota = 5000

[runtime]
hash_algorithm = "sha1"
dry_run = true
"#;
        let config: RunConfig = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.platforms.selection, vec!["nes", "psx"]);
        assert_eq!(config.preferred_regions(), vec![Region::Europe, Region::Usa]);
        assert_eq!(config.scraping.update_policy, UpdatePolicy::Always);
        assert_eq!(config.scraping.name_verification.threshold(), 0.4);
        assert_eq!(config.media.validation, MediaValidation::Strict);
        assert_eq!(config.api.r#override.max_workers, Some(2));
        assert_eq!(config.runtime.hash_algorithm, HashAlgorithm::Sha1);
        assert!(config.runtime.dry_run);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = RunConfig::default();
        config.paths = PathsConfig {
            rom_root: "/roms".into(),
            media_root: "/media".into(),
            catalog_root: "/catalogs".into(),
            platform_index: "/es_systems.xml".into(),
        };
        config.validate().unwrap();

        config.scraping.integrity_threshold = 1.5;
        assert!(config.validate().is_err());
        config.scraping.integrity_threshold = 0.95;

        config.media.enabled_types = vec!["holograms".into()];
        assert!(config.validate().is_err());
        config.media.enabled_types = vec!["covers".into()];

        config.regions = vec!["atlantis".into()];
        assert!(config.validate().is_err());
        config.regions = vec![];

        config.api.r#override.requests_per_minute = Some(0);
        assert!(config.validate().is_err());
        config.api.r#override.requests_per_minute = Some(30);

        config.api.r#override.max_workers = Some(0);
        assert!(config.validate().is_err());
        config.api.r#override.max_workers = None;

        config.api.r#override.daily_quota = Some(0);
        assert!(config.validate().is_err());
        config.api.r#override.daily_quota = Some(5000);
        config.validate().unwrap();
    }

    #[test]
    fn missing_paths_fail_validation() {
        let config = RunConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn verification_thresholds() {
        assert_eq!(NameVerification::Strict.threshold(), 0.8);
        assert_eq!(NameVerification::Normal.threshold(), 0.6);
        assert_eq!(NameVerification::Lenient.threshold(), 0.4);
        assert_eq!(NameVerification::Disabled.threshold(), 0.0);
    }
}

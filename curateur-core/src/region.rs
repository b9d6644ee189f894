use serde::{Deserialize, Serialize};

/// Geographic regions recognized in ROM filename tags and Provider responses.
///
/// Any region outside this closed set is ignored when parsing filenames or
/// Provider payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Region {
    /// USA / North America
    Usa,
    /// Europe (PAL regions)
    Europe,
    /// Japan
    Japan,
    /// World / region-free
    World,
    /// France
    France,
    /// Germany
    Germany,
    /// Spain
    Spain,
    /// Italy
    Italy,
    /// Netherlands
    Netherlands,
    /// Portugal
    Portugal,
    /// Brazil
    Brazil,
    /// Australia
    Australia,
    /// Korea
    Korea,
    /// China
    China,
    /// Taiwan
    Taiwan,
}

impl Region {
    /// The Provider's lowercase region code.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Self::Usa => "us",
            Self::Europe => "eu",
            Self::Japan => "jp",
            Self::World => "wor",
            Self::France => "fr",
            Self::Germany => "de",
            Self::Spain => "es",
            Self::Italy => "it",
            Self::Netherlands => "nl",
            Self::Portugal => "pt",
            Self::Brazil => "br",
            Self::Australia => "au",
            Self::Korea => "kr",
            Self::China => "cn",
            Self::Taiwan => "tw",
        }
    }

    /// Parse a region token as it appears in a parenthesized filename tag
    /// (e.g., "USA", "Europe", "JP", "W").
    pub fn from_token(token: &str) -> Option<Self> {
        let t = token.trim();
        let matches = |indicators: &[&str]| indicators.iter().any(|i| t.eq_ignore_ascii_case(i));
        if matches(&["USA", "US", "U"]) {
            Some(Self::Usa)
        } else if matches(&["Europe", "EUR", "EU", "E"]) {
            Some(Self::Europe)
        } else if matches(&["Japan", "JPN", "JP", "J"]) {
            Some(Self::Japan)
        } else if matches(&["World", "WOR", "W"]) {
            Some(Self::World)
        } else if matches(&["France", "FR"]) {
            Some(Self::France)
        } else if matches(&["Germany", "DE"]) {
            Some(Self::Germany)
        } else if matches(&["Spain", "ES"]) {
            Some(Self::Spain)
        } else if matches(&["Italy", "IT"]) {
            Some(Self::Italy)
        } else if matches(&["Netherlands", "NL"]) {
            Some(Self::Netherlands)
        } else if matches(&["Portugal", "PT"]) {
            Some(Self::Portugal)
        } else if matches(&["Brazil", "BR"]) {
            Some(Self::Brazil)
        } else if matches(&["Australia", "AU"]) {
            Some(Self::Australia)
        } else if matches(&["Korea", "KR"]) {
            Some(Self::Korea)
        } else if matches(&["China", "CN"]) {
            Some(Self::China)
        } else if matches(&["Taiwan", "TW"]) {
            Some(Self::Taiwan)
        } else {
            None
        }
    }

    /// Parse a Provider lowercase region code (e.g., "us", "wor").
    pub fn from_provider_code(code: &str) -> Option<Self> {
        match code {
            "us" => Some(Self::Usa),
            "eu" => Some(Self::Europe),
            "jp" => Some(Self::Japan),
            "wor" => Some(Self::World),
            "fr" => Some(Self::France),
            "de" => Some(Self::Germany),
            "es" => Some(Self::Spain),
            "it" => Some(Self::Italy),
            "nl" => Some(Self::Netherlands),
            "pt" => Some(Self::Portugal),
            "br" => Some(Self::Brazil),
            "au" => Some(Self::Australia),
            "kr" => Some(Self::Korea),
            "cn" => Some(Self::China),
            "tw" => Some(Self::Taiwan),
            _ => None,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_code())
    }
}

/// Languages recognized in filename tags and Provider text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    French,
    German,
    Spanish,
    Italian,
    Dutch,
    Portuguese,
    Japanese,
    Korean,
    Chinese,
}

impl Language {
    /// The Provider's lowercase language code.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::French => "fr",
            Self::German => "de",
            Self::Spanish => "es",
            Self::Italian => "it",
            Self::Dutch => "nl",
            Self::Portuguese => "pt",
            Self::Japanese => "ja",
            Self::Korean => "ko",
            Self::Chinese => "zh",
        }
    }

    /// Parse a language token as it appears in a filename tag (e.g., "En", "Fr").
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::English),
            "fr" => Some(Self::French),
            "de" => Some(Self::German),
            "es" => Some(Self::Spanish),
            "it" => Some(Self::Italian),
            "nl" => Some(Self::Dutch),
            "pt" => Some(Self::Portuguese),
            "ja" => Some(Self::Japanese),
            "ko" => Some(Self::Korean),
            "zh" => Some(Self::Chinese),
            _ => None,
        }
    }

    /// Parse a Provider lowercase language code.
    pub fn from_provider_code(code: &str) -> Option<Self> {
        Self::from_token(code)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.provider_code())
    }
}

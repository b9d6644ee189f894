use thiserror::Error;

/// Engine-level errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] curateur_core::CoreError),

    #[error(transparent)]
    Gamelist(#[from] curateur_gamelist::GamelistError),

    #[error(transparent)]
    Scrape(#[from] curateur_scraper::ScrapeError),

    #[error("run cancelled by operator")]
    Cancelled,
}

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

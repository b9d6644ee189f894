/// How an error should be handled by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort the whole run (credentials, closed API, exhausted quota).
    Fatal,
    /// Re-enqueue at high priority up to the retry limit.
    Retryable,
    /// Record on the not-found list; never retried.
    NotFound,
    /// Log and continue; at worst a gap in the catalog.
    SoftDegrade,
}

/// Errors from Provider communication and media handling.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by Provider")]
    RateLimit {
        /// Retry-After header value, when the Provider sent one.
        retry_after: Option<u64>,
    },

    #[error("daily quota exceeded ({used}/{max} requests)")]
    QuotaExceeded { used: u32, max: u32 },

    #[error("game not found in Provider database")]
    NotFound,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Provider is closed: {0}")]
    ServerClosed(String),

    #[error("server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("media validation failed: {0}")]
    MediaValidation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Map into the scheduler's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials(_)
            | Self::ServerClosed(_)
            | Self::QuotaExceeded { .. }
            | Self::Config(_) => ErrorKind::Fatal,
            Self::Http(_)
            | Self::RateLimit { .. }
            | Self::ServerError { .. }
            | Self::Timeout(_)
            | Self::Malformed(_)
            | Self::Io(_) => ErrorKind::Retryable,
            Self::NotFound => ErrorKind::NotFound,
            Self::MediaValidation(_) => ErrorKind::SoftDegrade,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}

use thiserror::Error;

/// Errors from core operations (platform index parsing, identity hashing).
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error while reading a file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing error in the platform index
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The platform index document is structurally invalid
    #[error("Invalid platform index: {0}")]
    InvalidIndex(String),
}

impl CoreError {
    pub fn invalid_index(msg: impl Into<String>) -> Self {
        Self::InvalidIndex(msg.into())
    }
}

use thiserror::Error;

/// Top-level error type for the ActionDeck workspace.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for DeckError` where they need to cross a crate
/// boundary with `?`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Preferences error: {0}")]
    Preferences(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<toml::de::Error> for DeckError {
    fn from(err: toml::de::Error) -> Self {
        DeckError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DeckError {
    fn from(err: toml::ser::Error) -> Self {
        DeckError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for DeckError {
    fn from(err: serde_json::Error) -> Self {
        DeckError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for ActionDeck operations.
pub type Result<T> = std::result::Result<T, DeckError>;

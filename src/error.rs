use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeletError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    // Engine errors
    #[error("Unsupported language: {language}. Supported languages are: {supported}")]
    UnsupportedLanguage {
        language: String,
        supported: String,
    },

    #[error("Workspace staging failed: {0}")]
    Staging(String),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CodeletError>;

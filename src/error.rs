//! Error types for cuedec.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CuedecError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Vocabulary / lexicon errors
    #[error("Failed to load tokens from {path}: {message}")]
    TokensLoad { path: String, message: String },

    #[error("Failed to load lexicon from {path}: {message}")]
    LexiconLoad { path: String, message: String },

    #[error("Vocabulary is empty after loading {path}")]
    VocabularyEmpty { path: String },

    // Sequence model errors
    #[error("Sequence model not found at {path}")]
    ModelNotFound { path: String },

    #[error("Sequence model inference failed: {message}")]
    ModelInference { message: String },

    #[error("Model vocabulary size changed mid-stream: pinned {pinned}, got {got}")]
    VocabSizeMismatch { pinned: usize, got: usize },

    // Corrector errors
    #[error("Failed to load homophones from {path}: {message}")]
    HomophonesLoad { path: String, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, CuedecError>;

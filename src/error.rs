use thiserror::Error;

/// Main error type for auto-swagger operations
#[derive(Error, Debug)]
pub enum AutoSwaggerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM provider error: {0}")]
    Llm(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Documentation generation failed: {0}")]
    Generation(String),

    #[error("Model reply rejected: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Reasons a model reply cannot be turned into changes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No JSON found in response")]
    NoJson,

    #[error("Malformed JSON in response: {0}")]
    MalformedJson(String),

    #[error("Response contained no changes")]
    EmptyChanges,

    #[error("Expected {expected} changes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Change {index} targets '{actual}' but context expects '{expected}'")]
    FilepathMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, AutoSwaggerError>;

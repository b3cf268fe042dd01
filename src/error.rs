use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The import file was refused as a whole.
    #[error("Invalid import file: {}", errors.join("; "))]
    InvalidImport { errors: Vec<String> },

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Why a persisted weight snapshot could not be used.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no persisted snapshot under key {0}")]
    Missing(String),

    #[error("could not read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("snapshot failed validation: {0}")]
    Invalid(String),
}

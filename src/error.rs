use thiserror::Error;

/// Failures of the persisted preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("preference database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("preference value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// An environment override that could not be parsed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key} must be a positive number, got {value}")]
    NotPositive { key: &'static str, value: f64 },
    #[error("zoom bounds are inverted: min {min} > max {max}")]
    InvertedZoomBounds { min: f64, max: f64 },
}

/// Failures while preparing the shell's on-disk files.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ShellResult<T> = Result<T, ShellError>;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP {status} from {url} at offset {offset}")]
    HttpStatus {
        status: u16,
        url: String,
        offset: usize,
    },

    #[error("Transport error at offset {offset}: {message}")]
    Transport { offset: usize, message: String },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Projection failed: {0}")]
    Projection(String),

    #[error("CRS mismatch: {left} vs {right}")]
    CrsMismatch { left: String, right: String },

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl ProcessingError {
    /// Whether a fetch failure is worth retrying.
    ///
    /// Rate limiting, server-side failures and transport problems are treated as
    /// transient. Anything else (bad query, missing resource, undecodable body)
    /// will fail the same way on the next attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport { .. } => true,
            _ => false,
        }
    }
}

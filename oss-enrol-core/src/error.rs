//! Error types for oss-enrol-core.

use thiserror::Error;

/// Result type alias using oss-enrol-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for reconciliation operations
#[derive(Error, Debug)]
pub enum Error {
    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    // Directory errors
    #[error("Directory unreachable: {0}")]
    DirectoryUnreachable(String),

    #[error("Directory bind failed for {dn}: {message}")]
    DirectoryBind { dn: String, message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Synchronisation disabled: {0}")]
    ConfigurationDisabled(String),

    // Store ownership / consistency errors
    #[error("Record {0} is owned by another component")]
    ForeignRecord(String),

    #[error("Write failed for {entity}: {message}")]
    WriteFailure { entity: String, message: String },

    #[error("Course not found: {0}")]
    CourseNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error for a failed write on a single entity
    pub fn write_failure(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailure {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the directory could not be reached or queried.
    pub fn is_directory_failure(&self) -> bool {
        matches!(self, Self::DirectoryUnreachable(_) | Self::DirectoryBind { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Config(format!("invalid pattern: {}", e))
    }
}

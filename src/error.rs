//! Error types for the survey bot.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Configuration-related errors. All of these are startup-fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse service account key: {0}")]
    BadServiceAccountKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Question catalog errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no categories")]
    Empty,

    #[error("Category {0} has no questions")]
    EmptyCategory(String),

    #[error("Question {index} in category {category} has no options")]
    NoOptions { category: String, index: usize },

    #[error("Duplicate category key: {0}")]
    DuplicateCategory(String),

    #[error("Unknown category: {0}")]
    CategoryNotFound(String),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel health check failed: {name}")]
    HealthCheckFailed { name: String },
}

/// Spreadsheet persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Append request failed: {0}")]
    Request(String),

    #[error("Append rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;

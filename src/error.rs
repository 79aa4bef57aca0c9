use thiserror::Error;

#[derive(Error, Debug)]
pub enum GymIntelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Ambiguous location '{0}': multiple equally-ranked candidates")]
    AmbiguousLocation(String),

    #[error("Could not find location: {0}")]
    LocationNotFound(String),

    #[error("All providers unavailable for this search")]
    AllProvidersUnavailable,

    #[error("Fetch timed out after {0} seconds")]
    FetchTimeout(u64),

    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Search {0} not found")]
    SearchNotFound(uuid::Uuid),

    #[error("API error: {message}")]
    Api { message: String },
}

pub type Result<T> = std::result::Result<T, GymIntelError>;

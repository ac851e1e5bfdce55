/// Shared error type used across all chatstorm crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("schema {schema_name}@{schema_version}: {message}")]
    SchemaInvalid {
        schema_name: String,
        schema_version: u32,
        path: String,
        message: String,
    },

    #[error("bus: {0}")]
    Bus(String),

    #[error("bus fatal: {0}")]
    BusFatal(String),

    #[error("generator: {0}")]
    Generator(String),

    #[error("memory: {0}")]
    Memory(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

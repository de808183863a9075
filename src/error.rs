//! Unified error type.

use thiserror::Error;

/// The error type returned by the crate's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding a port, loading configuration, compiling
/// ignore patterns, and writing access-log lines.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("invalid ignore_uri pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("log appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

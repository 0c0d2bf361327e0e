use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogdockError {
    #[error("configuration error: {0}")]
    Config(String),

    /// A CLI argument or query bound that is not a time or level.
    #[error("parse error: {0}")]
    Parse(String),

    /// The data file exists but does not hold a `{"logs": [...]}` document.
    #[error("corrupt data file: {0}")]
    Corrupt(String),

    #[error("failed to encode logs: {0}")]
    Encode(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LogdockError>;

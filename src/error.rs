use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid city list, line {line}: {reason}")]
    CityList { line: usize, reason: String },

    #[error("Shard plan at {path} doesn't match the current city list and worker count. Remove the output directory or restore the previous settings.")]
    PlanMismatch { path: PathBuf },

    #[error("Malformed table {path}: {reason}")]
    MalformedTable { path: PathBuf, reason: String },

    #[error("City {0} appears in more than one shard.")]
    DuplicateCity(String),

    #[error("The selector you are trying to scrape for is invalid. Selector: {0}")]
    ParseSelector(String),

    /// The page loaded but something went wrong on the way; worth another attempt.
    #[error("Transient page load failure: {0}")]
    Transient(String),

    /// The session can't be used anymore, the shard has to be abandoned.
    #[error("Session failed: {0}")]
    SessionFatal(String),

    #[error("Io Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio Join Error, couldn't await a task! {0}")]
    RuntimeJoin(#[from] tokio::task::JoinError),

    #[error("Reqwest Error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

impl Error {
    /// Whether a fetch attempt that failed with this error may be retried on the same session.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transient(_) => true,
            Error::Reqwest(err) => !err.is_builder(),
            _ => false,
        }
    }
}

//! Errors surfaced by a [`Session`](crate::Session).

use evoscope_optimization::{ConfigError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Expression(#[from] ValidationError),

    #[error("Malformed command: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("Command has no action")]
    MissingAction,

    #[error("Iteration {0} not available")]
    IterationNotAvailable(usize),
}

pub type SessionResult<T> = Result<T, SessionError>;

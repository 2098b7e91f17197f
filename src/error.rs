use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to launch engine '{path}': {reason}")]
    Launch { path: String, reason: String },

    #[error("Engine session is not started")]
    NotStarted,

    #[error("Engine session is already started")]
    AlreadyStarted,

    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Engine session is poisoned and must be discarded")]
    SessionPoisoned,

    #[error("Malformed response to '{command}': {detail}")]
    ProtocolParse { command: String, detail: String },

    #[error("Engine rejected '{command}': {line}")]
    EngineError { command: String, line: String },

    #[error("Unrecognized action token: {0}")]
    UnrecognizedAction(String),

    #[error("Compute did not finish within {0:?}")]
    ComputeTimeout(Duration),

    #[error("Invalid card notation: {0}")]
    InvalidCard(String),

    #[error("Invalid board notation: {0}")]
    InvalidBoard(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Logger setup failed: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractError {
    pub fn parse(command: &str, detail: impl Into<String>) -> ExtractError {
        ExtractError::ProtocolParse {
            command: command.to_string(),
            detail: detail.into(),
        }
    }

    /// True when the session that produced this error can no longer be trusted
    /// to answer further commands.
    pub fn poisons_session(&self) -> bool {
        matches!(
            self,
            ExtractError::Timeout { .. }
                | ExtractError::SessionPoisoned
                | ExtractError::NotStarted
                | ExtractError::Launch { .. }
                | ExtractError::Io(_)
        )
    }
}

pub type ExtractResult<T> = Result<T, ExtractError>;

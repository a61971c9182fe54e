use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarqueeError {
    #[error("Invalid value for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("No movie with id {0}")]
    NotFound(u64),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Infinite loop detected, command 'execute_script {}' skipped", .0.display())]
    ScriptRecursion(PathBuf),

    #[error("Invalid command '{0}', type \"help\" for information about commands")]
    UnknownCommand(String),

    #[error("This command doesn't take parameters")]
    UnexpectedParams,

    #[error("Missing parameter: {0}")]
    MissingParam(&'static str),

    #[error("The collection is empty")]
    EmptyCollection,

    #[error("Input ended while reading {0}")]
    InputClosed(&'static str),

    #[error("Too many invalid attempts for {0}")]
    AttemptsExhausted(&'static str),

    #[error("Document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl MarqueeError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation { field, reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, MarqueeError>;

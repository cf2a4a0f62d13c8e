use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::header::Tag;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("error: Unable to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("error: line {line}: {message} ({})", path.display())]
    SpecParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("error: {0}")]
    Macro(String),

    #[error("error: can not bind spec: {0}")]
    SpecBinding(String),

    #[error("error: {0} field must be present in package")]
    MissingField(Tag),

    #[error("error: bad header format: {0}")]
    Format(String),

    #[error("error: {0}")]
    Config(String),
}

impl Error {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Argument(_) => 2,
            _ => 1,
        }
    }

    /// True for failures that happened while reading the spec file itself.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            Error::SpecParse { .. } | Error::Open { .. } | Error::Macro(_)
        )
    }
}

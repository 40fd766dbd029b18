//! Host error taxonomy.
//!
//! Every variant is caught where the file-I/O call is made and turned into
//! a user notice or a log line; none of them ends the session.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("File already exists: {0}")]
    AlreadyExists(String),
    #[error("No workspace folder open")]
    NoWorkspace,
    #[error("Invalid whiteboard name: {0:?} (use letters, digits, '-' and '_')")]
    InvalidName(String),
    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] globset::Error),
}

pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    /// Whether the user should see this, as opposed to it only being logged.
    /// Parse failures fall back to an empty document and watch errors are
    /// expected while files are edited externally.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, HostError::Parse { .. } | HostError::Watch(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            HostError::NotFound(_) => "E_NOT_FOUND",
            HostError::AlreadyExists(_) => "E_ALREADY_EXISTS",
            HostError::NoWorkspace => "E_NO_WORKSPACE",
            HostError::InvalidName(_) => "E_INVALID_NAME",
            HostError::Parse { .. } => "E_PARSE",
            HostError::Write { .. } => "E_WRITE",
            HostError::Io(_) => "E_IO",
            HostError::Watch(_) => "E_WATCH",
            HostError::Pattern(_) => "E_PATTERN",
        }
    }
}

// Error types for adapter operations
use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause retained from the backend for diagnostics
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Stable classification of every failure the adapter reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    NotFound,
    AlreadyExists,
    Conflict,
    PermissionDenied,
    Timeout,
    UnknownOption,
    InvalidState,
    InvalidArgument,
    NotADirectory,
    IsADirectory,
    Backend,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Path not found: {path}")]
    NotFound {
        path: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Entry already exists: {path}")]
    AlreadyExists {
        path: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Conflict at {path}: {reason}")]
    Conflict {
        path: String,
        reason: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Operation timed out: {path}")]
    Timeout {
        path: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("Unknown option: {name}")]
    UnknownOption { name: String },

    #[error("Invalid state for {path}: {message}")]
    InvalidState { path: String, message: String },

    #[error("Invalid argument for {path:?}: {message}")]
    InvalidArgument { path: String, message: String },

    #[error("Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Is a directory: {path}")]
    IsADirectory { path: String },

    #[error("Backend error at {path}: {source}")]
    Backend {
        path: String,
        #[source]
        source: Cause,
    },
}

impl Error {
    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found<P: Into<String>>(path: P) -> Self {
        Error::NotFound {
            path: path.into(),
            source: None,
        }
    }

    pub fn already_exists<P: Into<String>>(path: P) -> Self {
        Error::AlreadyExists {
            path: path.into(),
            source: None,
        }
    }

    pub fn conflict<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Error::Conflict {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn unknown_option<S: Into<String>>(name: S) -> Self {
        Error::UnknownOption { name: name.into() }
    }

    pub fn invalid_state<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Error::InvalidState {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_argument<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Error::InvalidArgument {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn not_a_directory<P: Into<String>>(path: P) -> Self {
        Error::NotADirectory { path: path.into() }
    }

    pub fn is_a_directory<P: Into<String>>(path: P) -> Self {
        Error::IsADirectory { path: path.into() }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::UnknownOption { .. } => ErrorKind::UnknownOption,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
            Error::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Error::NotADirectory { .. } => ErrorKind::NotADirectory,
            Error::IsADirectory { .. } => ErrorKind::IsADirectory,
            Error::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// The caller-visible path the failure refers to, when there is one
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::UnknownOption { .. } => None,
            Error::InvalidPath { path, .. }
            | Error::NotFound { path, .. }
            | Error::AlreadyExists { path, .. }
            | Error::Conflict { path, .. }
            | Error::PermissionDenied { path, .. }
            | Error::Timeout { path, .. }
            | Error::InvalidState { path, .. }
            | Error::InvalidArgument { path, .. }
            | Error::NotADirectory { path }
            | Error::IsADirectory { path }
            | Error::Backend { path, .. } => Some(path),
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        let kind = match err.kind() {
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::PermissionDenied => io::ErrorKind::PermissionDenied,
            ErrorKind::Timeout => io::ErrorKind::TimedOut,
            ErrorKind::InvalidPath | ErrorKind::InvalidArgument | ErrorKind::UnknownOption => {
                io::ErrorKind::InvalidInput
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

/// A logical path that cannot be mapped under the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainmentError {
    #[error("illegal path '{0}'")]
    ParentSegment(String),
    #[error("path '{0}' escapes sandbox root")]
    Escape(String),
}

/// Directory-creation policy violations on the upload path.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("invalid directory path '{}'", .0.display())]
    InvalidPath(PathBuf),
    #[error("directory depth too deep ({depth} levels, max {max})")]
    TooDeep { depth: usize, max: usize },
    #[error("directory name '{0}' contains illegal characters")]
    IllegalCharacters(String),
    #[error("directory name too long (max {max} characters)")]
    NameTooLong { name: String, max: usize },
    #[error("directory creation would escape sandbox")]
    Escape(PathBuf),
    #[error("failed to create directory: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single backend operation. Every variant maps onto exactly one
/// response status; nothing else leaves the executor.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Containment(#[from] ContainmentError),
    #[error(transparent)]
    Security(#[from] SecurityError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("not a directory")]
    NotADirectory,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ExecError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ExecError::Containment(_)
            | ExecError::Security(_)
            | ExecError::BadRequest(_)
            | ExecError::NotADirectory => StatusCode::BAD_REQUEST,
            ExecError::NotFound(_) => StatusCode::NOT_FOUND,
            ExecError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ExecError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

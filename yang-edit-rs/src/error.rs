//! Error types for the edit/diff engine.

use thiserror::Error;

use crate::edit::EditOp;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while applying, merging or rewriting trees.
#[derive(Error, Debug)]
pub enum Error {
    /// A node or anchor required by the operation is absent.
    #[error("{0}")]
    NotFound(String),

    /// A `create` targeted a node that already exists.
    #[error("{0}")]
    AlreadyExists(String),

    /// Malformed edit input (missing keys, missing anchor, invalid value).
    #[error("{0}")]
    ValidationFailed(String),

    /// The operation would create a node whose parent cannot exist.
    #[error("{0}")]
    Unsupported(String),

    /// Invariant violation; never recoverable for the current call.
    #[error("internal error: {0}")]
    Internal(String),

    /// An operation handler failed at a particular node.
    #[error("Applying operation \"{op}\" on node \"{node}\" failed: {source}")]
    Operation {
        /// Resolved operation of the node.
        op: EditOp,
        /// Schema name of the node.
        node: String,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Malformed XML or path text.
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Error kinds, independent of the context attached on the way up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ValidationFailed,
    Unsupported,
    Internal,
    Parse,
    Io,
}

impl Error {
    /// Returns the kind of the innermost cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Operation { source, .. } => source.kind(),
            Error::Parse(_) | Error::Xml(_) => ErrorKind::Parse,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Wraps the error with the operation and node that failed.
    pub(crate) fn in_operation(self, op: EditOp, node: &str) -> Error {
        Error::Operation {
            op,
            node: node.to_string(),
            source: Box::new(self),
        }
    }
}

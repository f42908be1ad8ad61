use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in SSH core operations
#[derive(Error, Debug)]
pub enum SshCoreError {
    /// Invalid X display name
    #[error("invalid X display {spec:?}: {message}")]
    InvalidDisplay { spec: String, message: String },

    /// Invalid X authentication cookie
    #[error("invalid X11 cookie: {0}")]
    InvalidCookie(String),

    /// Empty value where one is required
    #[error("{field} must not be empty")]
    EmptyValue { field: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SSH protocol error
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    /// Connection failed
    #[error("failed to connect to {address}: {source}")]
    ConnectionFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Unix socket operation failed (Unix only)
    #[error("unix socket operation failed for {}: {source}", path.display())]
    UnixSocketFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Platform not supported for operation
    #[error("{operation} is only supported on Unix platforms")]
    PlatformNotSupported { operation: String },

    /// Server host key was refused
    #[error("host key rejected: {0}")]
    HostKeyRejected(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for SSH core operations
pub type SshResult<T> = Result<T, SshCoreError>;

impl SshCoreError {
    /// Create an invalid display error
    pub fn invalid_display(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDisplay {
            spec: spec.into(),
            message: message.into(),
        }
    }

    /// Create an empty value error
    pub fn empty(field: impl Into<String>) -> Self {
        Self::EmptyValue { field: field.into() }
    }
}

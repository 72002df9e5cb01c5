use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The result type used by the transmitter.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the transmitter.
#[derive(Debug, Error)]
pub enum Error {
    /// Already started.
    #[error("already started")]
    AlreadyStarted,

    /// Receiver hung up before replying with an offset.
    #[error("connection closed during handshake")]
    ClosedDuringHandshake,

    /// Connection attempt took longer than the configured timeout.
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Path has no usable UTF-8 base name to send as the header.
    #[error("path has no usable file name: {0:?}")]
    InvalidFileName(PathBuf),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Watch pattern is not a valid glob.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Handshake could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] logship_protocol::Error),
}

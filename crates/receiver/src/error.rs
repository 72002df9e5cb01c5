use thiserror::Error;

/// The result type used by the receiver.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the receiver.
#[derive(Debug, Error)]
pub enum Error {
    /// Already started.
    #[error("already started")]
    AlreadyStarted,

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// Bind host resolved to no addresses.
    #[error("no address found for bind host: {0}")]
    NoAddress(String),

    /// Handshake could not be decoded.
    #[error(transparent)]
    Protocol(#[from] logship_protocol::Error),

    /// Append store operation failed.
    #[error("append store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

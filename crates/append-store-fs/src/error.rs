use thiserror::Error;

/// Result type for filesystem append store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The storage name would resolve outside the storage root.
    #[error("refusing unsafe storage name: {0:?}")]
    UnsafeName(String),
}

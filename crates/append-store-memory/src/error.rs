use thiserror::Error;

/// Errors that can occur in this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The entry was opened but no longer exists in the store.
    #[error("entry vanished from store: {0}")]
    Vanished(String),
}

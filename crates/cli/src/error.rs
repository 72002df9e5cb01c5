use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    #[error(transparent)]
    Receiver(#[from] logship_receiver::Error),

    #[error(transparent)]
    Transmitter(#[from] logship_transmitter::Error),

    #[error("{0} exited unexpectedly")]
    UnexpectedExit(&'static str),
}

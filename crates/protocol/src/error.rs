use thiserror::Error;

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding or decoding handshake lines.
#[derive(Debug, Error)]
pub enum Error {
    /// Header named no file.
    #[error("header is empty")]
    EmptyHeader,

    /// File name would break line framing.
    #[error("header contains a line terminator")]
    HeaderContainsNewline,

    /// Header was not valid UTF-8.
    #[error("header is not valid utf-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// Offset reply was not a decimal integer.
    #[error("invalid offset: {0:?}")]
    InvalidOffset(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// No line terminator within the allowed length.
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    /// Peer closed the connection part way through a line.
    #[error("connection closed mid-line")]
    UnexpectedEof,
}

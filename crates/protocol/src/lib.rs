//! Wire protocol shared by the log transmitter and receiver.
//!
//! A session is a single handshake followed by an unframed byte stream:
//!
//! ```text
//! tx -> rx: <filename>\n
//! rx -> tx: <offset>\n
//! tx -> rx: raw file bytes from <offset> onwards, until close
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod line;

pub use error::{Error, Result};
pub use line::LineReader;

use std::fmt::{self, Display};

use bytes::Bytes;

/// "ship" on a phone keypad.
pub const DEFAULT_PORT: u16 = 7447;

/// Longest header or offset line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 4096;

const LINE_TERMINATOR: u8 = b'\n';

/// First message of a session, naming the file being shipped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    filename: String,
}

impl Header {
    /// Creates a header for `filename`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or contains a line terminator.
    pub fn new(filename: impl Into<String>) -> Result<Self> {
        let filename = filename.into();

        if filename.is_empty() {
            return Err(Error::EmptyHeader);
        }

        if filename.contains(['\n', '\r']) {
            return Err(Error::HeaderContainsNewline);
        }

        Ok(Self { filename })
    }

    /// Decodes a header line. Trailing whitespace and the terminator are stripped.
    ///
    /// # Errors
    ///
    /// Returns an error if the line is not UTF-8 or names no file.
    pub fn decode(line: &[u8]) -> Result<Self> {
        let filename = std::str::from_utf8(line)?.trim_end();

        Self::new(filename)
    }

    /// Encodes the header as `<filename>\n`.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut line = Vec::with_capacity(self.filename.len() + 1);
        line.extend_from_slice(self.filename.as_bytes());
        line.push(LINE_TERMINATOR);
        Bytes::from(line)
    }

    /// The shipped file's name.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Consumes the header, returning the file name.
    #[must_use]
    pub fn into_filename(self) -> String {
        self.filename
    }
}

/// Byte length of the receiver's copy of a file at handshake time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset(u64);

impl Offset {
    /// Wraps a byte count.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// The byte count.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Decodes a decimal ASCII offset line, ignoring surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOffset`] if the line is not a non-negative decimal integer.
    pub fn decode(line: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();

        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidOffset(trimmed.to_string()));
        }

        trimmed
            .parse()
            .map(Self)
            .map_err(|_| Error::InvalidOffset(trimmed.to_string()))
    }

    /// Encodes the offset as `<decimal>\n`.
    #[must_use]
    pub fn encode(self) -> Bytes {
        Bytes::from(format!("{}\n", self.0))
    }
}

impl Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Offset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

//! Abstract interface for append-only storage of shipped log files.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::net::IpAddr;

use async_trait::async_trait;

/// Identifies one entry in an append store.
///
/// The storage name is the file name sent by the transmitter, optionally
/// prefixed with the address of the host that sent it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    source: Option<IpAddr>,
    name: String,
}

impl EntryKey {
    /// Creates a key with no source identity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            source: None,
            name: name.into(),
        }
    }

    /// Attaches the address of the sending host to the key.
    #[must_use]
    pub const fn with_source(mut self, source: IpAddr) -> Self {
        self.source = Some(source);
        self
    }

    /// The file name as sent by the transmitter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The sending host, if the key carries one.
    #[must_use]
    pub const fn source(&self) -> Option<IpAddr> {
        self.source
    }

    /// The name the entry is stored under: `<source>_<name>` or `<name>`.
    #[must_use]
    pub fn storage_name(&self) -> String {
        match self.source {
            Some(source) => format!("{source}_{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_name())
    }
}

/// A collection of growable entries, each only ever appended to.
///
/// # Associated Types
/// - `Error`: The error type that implements `Debug`, `Error`, `Send`, and `Sync`.
/// - `Entry`: The handle returned by [`AppendStore::open`].
///
/// # Required Methods
/// - `async fn open(&self, key: &EntryKey) -> Result<Self::Entry, Self::Error>`: Opens (creating if needed) an entry positioned at its end.
/// - `async fn len(&self, key: &EntryKey) -> Result<Option<u64>, Self::Error>`: Current length of an entry, if it exists.
#[async_trait]
pub trait AppendStore: Clone + Send + Sync + 'static {
    /// Error type for store operations.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Handle to a single open entry.
    type Entry: AppendEntry<Error = Self::Error>;

    /// Opens the entry for `key` for appending. Never truncates.
    async fn open(&self, key: &EntryKey) -> Result<Self::Entry, Self::Error>;

    /// Returns the current length of the entry, or `None` if it does not exist.
    async fn len(&self, key: &EntryKey) -> Result<Option<u64>, Self::Error>;
}

/// An open entry of an [`AppendStore`].
#[async_trait]
pub trait AppendEntry: Send + Sized + 'static {
    /// Error type for entry operations.
    type Error: Debug + Error + Send + Sync + 'static;

    /// Length of the entry: its size when opened plus everything appended since.
    fn len(&self) -> u64;

    /// Whether the entry currently holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `bytes` verbatim to the end of the entry.
    async fn append(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Flushes and releases the entry.
    async fn close(self) -> Result<(), Self::Error>;
}

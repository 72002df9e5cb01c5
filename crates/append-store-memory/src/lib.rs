//! In-memory implementation of the append store, for tests and local
//! development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use logship_append_store::{AppendEntry, AppendStore, EntryKey};
use tokio::sync::Mutex;

type Entries = Arc<Mutex<HashMap<String, BytesMut>>>;

/// In-memory append store.
#[derive(Clone, Debug, Default)]
pub struct MemoryAppendStore {
    map: Entries,
}

impl MemoryAppendStore {
    /// Creates a new `MemoryAppendStore`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything appended to `key` so far.
    pub async fn contents(&self, key: &EntryKey) -> Option<Bytes> {
        let map = self.map.lock().await;
        map.get(&key.storage_name())
            .map(|bytes| Bytes::copy_from_slice(bytes))
    }

    /// Storage names of every entry in the store.
    pub async fn keys(&self) -> Vec<String> {
        self.map.lock().await.keys().cloned().collect()
    }
}

#[async_trait]
impl AppendStore for MemoryAppendStore {
    type Error = Error;
    type Entry = MemoryAppendEntry;

    async fn open(&self, key: &EntryKey) -> Result<MemoryAppendEntry, Error> {
        let name = key.storage_name();
        let len = self.map.lock().await.entry(name.clone()).or_default().len() as u64;

        Ok(MemoryAppendEntry {
            map: Arc::clone(&self.map),
            name,
            len,
        })
    }

    async fn len(&self, key: &EntryKey) -> Result<Option<u64>, Error> {
        let map = self.map.lock().await;
        Ok(map.get(&key.storage_name()).map(|bytes| bytes.len() as u64))
    }
}

/// Handle to one entry of a [`MemoryAppendStore`].
#[derive(Debug)]
pub struct MemoryAppendEntry {
    map: Entries,
    name: String,
    len: u64,
}

#[async_trait]
impl AppendEntry for MemoryAppendEntry {
    type Error = Error;

    fn len(&self) -> u64 {
        self.len
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut map = self.map.lock().await;
        let entry = map
            .get_mut(&self.name)
            .ok_or_else(|| Error::Vanished(self.name.clone()))?;

        entry.extend_from_slice(bytes);
        self.len = entry.len() as u64;

        Ok(())
    }

    async fn close(self) -> Result<(), Error> {
        Ok(())
    }
}

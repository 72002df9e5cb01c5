//! Append store backed by plain files under a storage root directory.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use logship_append_store::{AppendEntry, AppendStore, EntryKey};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{self, AsyncWriteExt};
use tracing::debug;

/// Append store using one file per entry.
#[derive(Clone, Debug)]
pub struct FsAppendStore {
    root: PathBuf,
}

impl FsAppendStore {
    /// Creates a new `FsAppendStore` rooted at the specified directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the file backing `key`.
    ///
    /// Nested relative names are allowed and get their directories created on
    /// open. Absolute names, `..` components and NUL bytes are rejected.
    fn get_file_path(&self, key: &EntryKey) -> Result<PathBuf> {
        let name = key.storage_name();
        let relative = Path::new(&name);

        let mut has_normal = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_normal = true,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::UnsafeName(name));
                }
            }
        }

        if !has_normal || name.contains('\0') {
            return Err(Error::UnsafeName(name));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AppendStore for FsAppendStore {
    type Error = Error;
    type Entry = FsAppendEntry;

    async fn open(&self, key: &EntryKey) -> Result<FsAppendEntry> {
        let path = self.get_file_path(key)?;

        if let Some(parent) = path.parent() {
            // create_dir_all is a no-op for directories that already exist
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Io("error creating directory", e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::Io("error opening file", e))?;

        let len = file
            .metadata()
            .await
            .map_err(|e| Error::Io("error reading file metadata", e))?
            .len();

        debug!("opened {} at offset {}", path.display(), len);

        Ok(FsAppendEntry { file, path, len })
    }

    async fn len(&self, key: &EntryKey) -> Result<Option<u64>> {
        let path = self.get_file_path(key)?;

        match fs::metadata(path).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io("error reading file metadata", e)),
        }
    }
}

/// A file opened in append mode.
#[derive(Debug)]
pub struct FsAppendEntry {
    file: File,
    path: PathBuf,
    len: u64,
}

impl FsAppendEntry {
    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AppendEntry for FsAppendEntry {
    type Error = Error;

    fn len(&self) -> u64 {
        self.len
    }

    async fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| Error::Io("error writing file", e))?;
        self.file
            .flush()
            .await
            .map_err(|e| Error::Io("error flushing file", e))?;

        self.len += bytes.len() as u64;

        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::Io("error flushing file", e))?;

        debug!("closed {} at offset {}", self.path.display(), self.len);

        Ok(())
    }
}

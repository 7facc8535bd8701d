//! Small string key-value stores backing persisted metrics and A/B assignments.

use quill_core::{Error, IgnoreLock as _, Result};
use serde_json::{from_str, to_string_pretty};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::RoutingError;

/// Persistent string storage.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Volatile store for tests and runs that should leave nothing behind.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    /// Stored values
    values: Mutex<BTreeMap<String, String>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock_ignore_poison().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock_ignore_poison()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// JSON object on disk, rewritten atomically on every `set`.
#[derive(Debug)]
pub struct FileStore {
    /// Backing file
    path: PathBuf,
    /// In-memory copy of the file contents
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store, starting empty if the file does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => from_str(&contents)
                .map_err(|error| RoutingError::store(&path, format!("corrupt state: {error}")))?,
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => return Err(RoutingError::Io(error)),
        };
        debug!("Opened state store {:?} with {} keys", path, values.len());
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole map through a temporary file and renames it into place.
    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let directory = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(directory)?;

        let contents = to_string_pretty(values)?;
        let mut temp = NamedTempFile::new_in(directory)?;
        temp.write_all(contents.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path)
            .map_err(|error| Error::Io(error.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock_ignore_poison().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock_ignore_poison();
        let previous = values.insert(key.to_owned(), value.to_owned());
        if let Err(error) = self.write_all(&values) {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => values.insert(key.to_owned(), old),
                None => values.remove(key),
            };
            return Err(error);
        }
        Ok(())
    }
}

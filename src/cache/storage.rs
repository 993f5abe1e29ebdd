//! Key-value blob storage backing cache persistence.

use crate::errors::CalendarError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A minimal string key-value store in the shape of browser `localStorage`.
pub trait Storage: Send + Sync {
    /// # Errors
    /// Returns `Storage` when the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, CalendarError>;

    /// # Errors
    /// Returns `Storage` when the backend cannot be written.
    fn set_item(&self, key: &str, value: &str) -> Result<(), CalendarError>;

    /// # Errors
    /// Returns `Storage` when the item exists but cannot be removed.
    fn remove_item(&self, key: &str) -> Result<(), CalendarError>;
}

/// In-process storage; useful for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, CalendarError> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CalendarError> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), CalendarError> {
        self.items.write().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (and creates if needed) a storage directory.
    ///
    /// # Errors
    /// Returns `Storage` if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CalendarError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| CalendarError::Storage(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// `{data_dir}/slotcache`, or `./.slotcache` when the platform has no data dir.
    #[must_use]
    pub fn default_dir() -> PathBuf {
        dirs_next::data_dir()
            .map(|d| d.join("slotcache"))
            .unwrap_or_else(|| PathBuf::from(".slotcache"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so distinct keys
    /// never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut safe = String::with_capacity(key.len());
        for b in key.bytes() {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                safe.push(char::from(b));
            } else {
                safe.push_str(&format!("%{b:02X}"));
            }
        }
        self.dir.join(format!("{safe}.json"))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, CalendarError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CalendarError::Storage(format!("read {key}: {e}"))),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), CalendarError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let write = || -> io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(value.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| CalendarError::Storage(format!("write {key}: {e}")))
    }

    fn remove_item(&self, key: &str) -> Result<(), CalendarError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CalendarError::Storage(format!("remove {key}: {e}"))),
        }
    }
}

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::repository::{LocalCache, StorageError};

/// File-backed `LocalCache`: one `<key>.json` file per key under a directory.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Use `dir` as the cache root, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::Serialization(format!(
                "invalid cache key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalCache for FileCache {
    fn read(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        let path = self.slot_path(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StorageError::Connection(err.to_string())),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    fn write(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        let path = self.slot_path(key)?;
        let tmp = path.with_extension("json.tmp");
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&tmp, bytes).map_err(|e| StorageError::Connection(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::trace!(path = %path.display(), "cache slot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_slot_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        assert!(cache.read("progress").unwrap().is_none());
    }

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path().join("nested")).unwrap();
        cache.write("progress", &json!(["L1", "L2"])).unwrap();

        assert_eq!(cache.read("progress").unwrap(), Some(json!(["L1", "L2"])));
        assert!(!dir.path().join("nested/progress.json.tmp").exists());
    }

    #[test]
    fn garbage_on_disk_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("progress.json"), b"[\"L1\",").unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        assert!(matches!(
            cache.read("progress"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path()).unwrap();
        assert!(cache.write("../evil", &json!([])).is_err());
        assert!(cache.read("").is_err());
    }
}

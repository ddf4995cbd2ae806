//! Structured file storage.
//!
//! This module provides:
//! - [`FileStore`] - Read, write and delete structured records on disk
//! - [`Format`] - Name of a pluggable serialization format (`yaml`, `json`, ...)
//! - [`WriteMode`] - Merge-on-write or verbatim overwrite
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//!
//! Records are handled as JSON-shaped values in memory regardless of the
//! on-disk format, so every format only has to convert between text and
//! [`serde_json::Value`].
//!
//! # Example
//!
//! ```rust,ignore
//! use nvl_core::store::{FileStore, Format, WriteMode};
//!
//! let store = FileStore::with_default_formats();
//! store.write(&path, &profile, &Format::yaml(), WriteMode::Merge)?;
//! let profile: IssuerProfile = store.read(&path, &Format::yaml())?;
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

mod json;
mod secret;
mod yaml;

pub use secret::Secret;

/// A structured record as held in memory.
pub type Record = Map<String, Value>;

/// Converts an in-memory record to file contents.
pub type SerializeFn = Arc<dyn Fn(&Value) -> Result<String, String> + Send + Sync>;

/// Converts file contents to an in-memory record.
pub type DeserializeFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;

/// Name of a serialization format.
///
/// Format names are normalized to lowercase and double as file extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Format(String);

impl Format {
    /// Create a format name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().to_lowercase())
    }

    /// The YAML format used for issuer configuration and global settings.
    pub fn yaml() -> Self {
        Self::new("yaml")
    }

    /// The JSON format used for session files.
    pub fn json() -> Self {
        Self::new("json")
    }

    /// Get the format name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension used for files in this format.
    pub fn extension(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How [`FileStore::write`] treats an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Shallow-merge the new record over the existing file's record.
    ///
    /// Keys the caller did not set survive the write.
    #[default]
    Merge,

    /// Replace the file contents with the record verbatim.
    Overwrite,
}

/// Error type for file store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file does not exist.
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// No serializer or deserializer is registered for the format.
    #[error("no {direction} registered for format '{format}'")]
    UnknownFormat {
        format: String,
        direction: &'static str,
    },

    /// The file contents could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// The record could not be serialized.
    #[error("failed to serialize record for {}: {message}", path.display())]
    Serialize { path: PathBuf, message: String },

    /// The record is not a key/value mapping.
    #[error("record for {} is not a mapping", path.display())]
    NotAMapping { path: PathBuf },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Raw contents of a file captured by [`FileStore::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(Option<Vec<u8>>);

impl Snapshot {
    /// Whether the file existed when the snapshot was taken.
    pub fn existed(&self) -> bool {
        self.0.is_some()
    }
}

/// Reads and writes structured records using pluggable formats.
///
/// The store keeps no cache; every call touches the filesystem.
#[derive(Clone, Default)]
pub struct FileStore {
    serializers: HashMap<Format, SerializeFn>,
    deserializers: HashMap<Format, DeserializeFn>,
}

impl FileStore {
    /// Create a store with no formats registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the YAML and JSON formats registered.
    pub fn with_default_formats() -> Self {
        let mut store = Self::new();
        yaml::register(&mut store);
        json::register(&mut store);
        store
    }

    /// Register the serializer for a format, replacing any previous one.
    pub fn register_serializer<F>(&mut self, format: Format, serializer: F)
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        self.serializers.insert(format, Arc::new(serializer));
    }

    /// Register the deserializer for a format, replacing any previous one.
    pub fn register_deserializer<F>(&mut self, format: Format, deserializer: F)
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.deserializers.insert(format, Arc::new(deserializer));
    }

    /// Read a file as an untyped record.
    pub fn read_value(&self, path: &Path, format: &Format) -> Result<Value, StoreError> {
        let deserialize =
            self.deserializers
                .get(format)
                .ok_or_else(|| StoreError::UnknownFormat {
                    format: format.to_string(),
                    direction: "deserializer",
                })?;

        let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;

        deserialize(&contents).map_err(|message| StoreError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Read a file and deserialize it into `T`.
    pub fn read<T: DeserializeOwned>(&self, path: &Path, format: &Format) -> Result<T, StoreError> {
        let value = self.read_value(path, format)?;
        serde_json::from_value(value).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Serialize `record` and write it to `path`.
    ///
    /// Parent directories are created as needed. In [`WriteMode::Merge`] an
    /// existing file that cannot be read or parsed is treated as empty.
    pub fn write<T>(
        &self,
        path: &Path,
        record: &T,
        format: &Format,
        mode: WriteMode,
    ) -> Result<(), StoreError>
    where
        T: Serialize + ?Sized,
    {
        let serialize = self
            .serializers
            .get(format)
            .ok_or_else(|| StoreError::UnknownFormat {
                format: format.to_string(),
                direction: "serializer",
            })?;

        let value = serde_json::to_value(record).map_err(|e| StoreError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let Value::Object(mut fields) = value else {
            return Err(StoreError::NotAMapping {
                path: path.to_path_buf(),
            });
        };

        if mode == WriteMode::Merge {
            match self.read_value(path, format) {
                Ok(Value::Object(mut existing)) => {
                    existing.extend(fields);
                    fields = existing;
                }
                Ok(_) => {
                    debug!(path = %path.display(), "existing file is not a mapping, overwriting");
                }
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "ignoring unreadable file during merge");
                }
            }
        }

        let contents = serialize(&Value::Object(fields)).map_err(|message| {
            StoreError::Serialize {
                path: path.to_path_buf(),
                message,
            }
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        fs::write(path, contents).map_err(|e| StoreError::io(path, e))
    }

    /// Rename top-level keys of an existing mapping in place.
    ///
    /// For each `(from, to)` pair the value under `from` moves to `to`
    /// unless `to` is already set, in which case `from` is dropped. Returns
    /// whether the file changed. A missing file is left alone.
    pub fn rename_keys(
        &self,
        path: &Path,
        format: &Format,
        renames: &[(&str, &str)],
    ) -> Result<bool, StoreError> {
        self.edit_mapping(path, format, |fields| rename_in(fields, renames))
    }

    /// Remove top-level keys of an existing mapping.
    ///
    /// Returns whether the file changed. A missing file is left alone.
    pub fn remove_keys(
        &self,
        path: &Path,
        format: &Format,
        keys: &[&str],
    ) -> Result<bool, StoreError> {
        self.edit_mapping(path, format, |fields| {
            keys.iter()
                .fold(false, |changed, key| fields.remove(*key).is_some() || changed)
        })
    }

    fn edit_mapping<F>(&self, path: &Path, format: &Format, edit: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Record) -> bool,
    {
        let mut fields = match self.read_value(path, format) {
            Ok(Value::Object(fields)) => fields,
            Ok(_) | Err(StoreError::NotFound { .. }) | Err(StoreError::Parse { .. }) => {
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if !edit(&mut fields) {
            return Ok(false);
        }
        debug!(path = %path.display(), "rewriting keys");
        self.write(path, &fields, format, WriteMode::Overwrite)?;
        Ok(true)
    }

    /// Remove a file or empty directory.
    ///
    /// Succeeds if the target does not exist.
    pub fn delete(&self, path: &Path) -> Result<(), StoreError> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StoreError::io(path, e)),
        };

        let result = if metadata.is_dir() {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Capture the raw contents of a file, or its absence.
    pub fn snapshot(&self, path: &Path) -> Result<Snapshot, StoreError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Snapshot(Some(bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Snapshot(None)),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// Put a file back the way [`snapshot`](Self::snapshot) found it.
    pub fn restore(&self, path: &Path, snapshot: Snapshot) -> Result<(), StoreError> {
        match snapshot.0 {
            Some(bytes) => fs::write(path, bytes).map_err(|e| StoreError::io(path, e)),
            None => self.delete(path),
        }
    }
}

/// Rename top-level keys of an in-memory record.
///
/// Same rules as [`FileStore::rename_keys`].
pub fn rename_in(record: &mut Record, renames: &[(&str, &str)]) -> bool {
    let mut changed = false;
    for (from, to) in renames {
        if let Some(value) = record.remove(*from) {
            record.entry(to.to_string()).or_insert(value);
            changed = true;
        }
    }
    changed
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<&str> = self.serializers.keys().map(Format::as_str).collect();
        formats.sort_unstable();
        f.debug_struct("FileStore")
            .field("formats", &formats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (FileStore, TempDir) {
        (FileStore::with_default_formats(), TempDir::new().unwrap())
    }

    #[test]
    fn test_read_missing_file() {
        let (store, temp) = store();
        let result = store.read_value(&temp.path().join("missing.yaml"), &Format::yaml());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_read_unknown_format() {
        let (store, temp) = store();
        let path = temp.path().join("record.toml");
        fs::write(&path, "a = 1").unwrap();

        let result = store.read_value(&path, &Format::new("toml"));
        assert!(matches!(
            result,
            Err(StoreError::UnknownFormat { direction: "deserializer", .. })
        ));
    }

    #[test]
    fn test_read_malformed_file() {
        let (store, temp) = store();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let result = store.read_value(&path, &Format::json());
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let (store, temp) = store();
        let path = temp.path().join("a").join("b").join("record.yaml");

        store
            .write(&path, &json!({"name": "Alpha"}), &Format::yaml(), WriteMode::Merge)
            .unwrap();

        let value = store.read_value(&path, &Format::yaml()).unwrap();
        assert_eq!(value, json!({"name": "Alpha"}));
    }

    #[test]
    fn test_merge_keeps_untouched_keys() {
        let (store, temp) = store();
        let path = temp.path().join("record.yaml");

        store
            .write(&path, &json!({"name": "Alpha", "issuer": "https://a.example"}), &Format::yaml(), WriteMode::Merge)
            .unwrap();
        store
            .write(&path, &json!({"name": "Renamed", "client_id": "abc"}), &Format::yaml(), WriteMode::Merge)
            .unwrap();

        let value = store.read_value(&path, &Format::yaml()).unwrap();
        assert_eq!(
            value,
            json!({"name": "Renamed", "issuer": "https://a.example", "client_id": "abc"})
        );
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let (store, temp) = store();
        let path = temp.path().join("record.json");

        store
            .write(&path, &json!({"a": 1, "b": 2}), &Format::json(), WriteMode::Merge)
            .unwrap();
        store
            .write(&path, &json!({"b": 3}), &Format::json(), WriteMode::Overwrite)
            .unwrap();

        let value = store.read_value(&path, &Format::json()).unwrap();
        assert_eq!(value, json!({"b": 3}));
    }

    #[test]
    fn test_merge_over_corrupt_file() {
        let (store, temp) = store();
        let path = temp.path().join("record.json");
        fs::write(&path, "garbage").unwrap();

        store
            .write(&path, &json!({"a": 1}), &Format::json(), WriteMode::Merge)
            .unwrap();

        let value = store.read_value(&path, &Format::json()).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_write_rejects_non_mapping() {
        let (store, temp) = store();
        let result = store.write(
            &temp.path().join("list.json"),
            &json!([1, 2, 3]),
            &Format::json(),
            WriteMode::Overwrite,
        );
        assert!(matches!(result, Err(StoreError::NotAMapping { .. })));
    }

    #[test]
    fn test_rename_keys() {
        let (store, temp) = store();
        let path = temp.path().join("record.yaml");
        fs::write(&path, "name: Alpha\ncaCertPath: /etc/ca.pem\n").unwrap();

        let changed = store
            .rename_keys(&path, &Format::yaml(), &[("caCertPath", "ca_cert_path")])
            .unwrap();
        assert!(changed);

        let value = store.read_value(&path, &Format::yaml()).unwrap();
        assert_eq!(value, json!({"name": "Alpha", "ca_cert_path": "/etc/ca.pem"}));

        let changed = store
            .rename_keys(&path, &Format::yaml(), &[("caCertPath", "ca_cert_path")])
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_rename_keys_keeps_existing_target() {
        let (store, temp) = store();
        let path = temp.path().join("record.yaml");
        fs::write(&path, "caCertPath: /old.pem\nca_cert_path: /new.pem\n").unwrap();

        store
            .rename_keys(&path, &Format::yaml(), &[("caCertPath", "ca_cert_path")])
            .unwrap();

        let value = store.read_value(&path, &Format::yaml()).unwrap();
        assert_eq!(value, json!({"ca_cert_path": "/new.pem"}));
    }

    #[test]
    fn test_remove_keys() {
        let (store, temp) = store();
        let path = temp.path().join("record.json");
        store
            .write(&path, &json!({"a": 1, "b": 2}), &Format::json(), WriteMode::Merge)
            .unwrap();

        assert!(store.remove_keys(&path, &Format::json(), &["b", "c"]).unwrap());
        assert!(!store.remove_keys(&path, &Format::json(), &["b"]).unwrap());
        assert_eq!(store.read_value(&path, &Format::json()).unwrap(), json!({"a": 1}));

        let missing = temp.path().join("missing.json");
        assert!(!store.remove_keys(&missing, &Format::json(), &["a"]).unwrap());
        assert!(!missing.exists());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let (store, temp) = store();
        store.delete(&temp.path().join("nothing-here")).unwrap();
    }

    #[test]
    fn test_delete_file_and_empty_directory() {
        let (store, temp) = store();
        let file = temp.path().join("record.json");
        let dir = temp.path().join("empty");
        fs::write(&file, "{}").unwrap();
        fs::create_dir(&dir).unwrap();

        store.delete(&file).unwrap();
        store.delete(&dir).unwrap();

        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_delete_non_empty_directory_fails() {
        let (store, temp) = store();
        let dir = temp.path().join("full");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("file"), "x").unwrap();

        let result = store.delete(&dir);
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_last_registration_wins() {
        let (mut store, temp) = store();
        let path = temp.path().join("record.json");
        store.register_serializer(Format::json(), |_| Ok("{\"replaced\": true}".to_string()));

        store
            .write(&path, &json!({"a": 1}), &Format::json(), WriteMode::Overwrite)
            .unwrap();

        let value = store.read_value(&path, &Format::json()).unwrap();
        assert_eq!(value, json!({"replaced": true}));
    }

    #[test]
    fn test_snapshot_and_restore() {
        let (store, temp) = store();
        let existing = temp.path().join("existing.yaml");
        let fresh = temp.path().join("fresh.yaml");
        fs::write(&existing, "name: Before\n").unwrap();

        let existing_snapshot = store.snapshot(&existing).unwrap();
        let fresh_snapshot = store.snapshot(&fresh).unwrap();
        assert!(existing_snapshot.existed());
        assert!(!fresh_snapshot.existed());

        fs::write(&existing, "name: After\n").unwrap();
        fs::write(&fresh, "name: New\n").unwrap();

        store.restore(&existing, existing_snapshot).unwrap();
        store.restore(&fresh, fresh_snapshot).unwrap();

        assert_eq!(fs::read_to_string(&existing).unwrap(), "name: Before\n");
        assert!(!fresh.exists());
    }
}

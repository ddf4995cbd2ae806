//! Home directory layout and global settings.
//!
//! Everything nvl persists lives under one root, `~/.nvl` by default:
//!
//! ```text
//! ~/.nvl/
//! ├── config.yaml          global settings (default issuer, log level)
//! ├── issuers/<id>.yaml    issuer configuration
//! └── sessions/<id>.json   tokens per issuer
//! ```
//!
//! The root can be moved with the `NVL_HOME` environment variable.

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::IssuerId;
use crate::store::{FileStore, Format, StoreError, WriteMode};

/// Environment variable overriding the home root.
pub const HOME_ENV: &str = "NVL_HOME";

/// Name of the home directory under the user's home.
const HOME_DIR_NAME: &str = ".nvl";

/// Error type for locating the home directory.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory could be determined.
    #[error("cannot determine home directory; set NVL_HOME explicitly")]
    HomeUnavailable,
}

/// Paths of the files nvl keeps on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvlHome {
    root: PathBuf,
}

impl NvlHome {
    /// Use `root` as the home directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the home directory.
    ///
    /// Precedence: the explicit path, then `NVL_HOME`, then `~/.nvl`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }

        if let Some(root) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }

        Self::default_root().map(Self::new)
    }

    /// The default root, `~/.nvl`.
    pub fn default_root() -> Result<PathBuf, ConfigError> {
        let dirs = BaseDirs::new().ok_or(ConfigError::HomeUnavailable)?;
        Ok(dirs.home_dir().join(HOME_DIR_NAME))
    }

    /// The home root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one configuration file per issuer.
    pub fn issuers_dir(&self) -> PathBuf {
        self.root.join("issuers")
    }

    /// Directory holding one session file per issuer.
    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join("sessions")
    }

    /// The global settings file.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Configuration file for an issuer.
    pub fn issuer_file(&self, id: &IssuerId) -> PathBuf {
        self.issuers_dir()
            .join(format!("{}.{}", id, Format::yaml().extension()))
    }

    /// Session file for an issuer.
    pub fn session_file(&self, id: &IssuerId) -> PathBuf {
        self.sessions_dir()
            .join(format!("{}.{}", id, Format::json().extension()))
    }
}

/// Process-wide settings stored in `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// Issuer used when several are configured and none is named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_issuer: Option<IssuerId>,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Settings nvl does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GlobalConfig {
    /// Load the settings file, returning defaults if it does not exist.
    pub fn load(files: &FileStore, home: &NvlHome) -> Result<Self, StoreError> {
        match files.read(&home.config_file(), &Format::yaml()) {
            Ok(config) => Ok(config),
            Err(StoreError::NotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Write the settings file.
    ///
    /// The whole record is held in memory, so the file is overwritten; a
    /// merge would resurrect keys that were deliberately removed.
    pub fn save(&self, files: &FileStore, home: &NvlHome) -> Result<(), StoreError> {
        files.write(&home.config_file(), self, &Format::yaml(), WriteMode::Overwrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let home = NvlHome::new("/tmp/nvl-home");
        let id = IssuerId::new("alpha");

        assert_eq!(home.config_file(), PathBuf::from("/tmp/nvl-home/config.yaml"));
        assert_eq!(home.issuer_file(&id), PathBuf::from("/tmp/nvl-home/issuers/alpha.yaml"));
        assert_eq!(home.session_file(&id), PathBuf::from("/tmp/nvl-home/sessions/alpha.json"));
    }

    #[test]
    fn test_explicit_root_wins() {
        let home = NvlHome::resolve(Some(PathBuf::from("/srv/nvl"))).unwrap();
        assert_eq!(home.root(), Path::new("/srv/nvl"));
    }

    #[test]
    fn test_missing_config_is_default() {
        let temp = TempDir::new().unwrap();
        let home = NvlHome::new(temp.path());
        let config = GlobalConfig::load(&FileStore::with_default_formats(), &home).unwrap();
        assert_eq!(config, GlobalConfig::default());
    }

    #[test]
    fn test_clearing_default_removes_key() {
        let temp = TempDir::new().unwrap();
        let home = NvlHome::new(temp.path());
        let files = FileStore::with_default_formats();

        let mut config = GlobalConfig {
            default_issuer: Some(IssuerId::new("alpha")),
            ..GlobalConfig::default()
        };
        config.extra.insert("theme".to_string(), Value::from("dark"));
        config.save(&files, &home).unwrap();

        let text = std::fs::read_to_string(home.config_file()).unwrap();
        assert!(text.contains("defaultIssuer: alpha"));

        config.default_issuer = None;
        config.save(&files, &home).unwrap();

        let loaded = GlobalConfig::load(&files, &home).unwrap();
        assert!(loaded.default_issuer.is_none());
        assert_eq!(loaded.extra.get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn test_corrupt_config_is_an_error() {
        let temp = TempDir::new().unwrap();
        let home = NvlHome::new(temp.path());
        std::fs::write(home.config_file(), "defaultIssuer: [oops").unwrap();

        let result = GlobalConfig::load(&FileStore::with_default_formats(), &home);
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }
}

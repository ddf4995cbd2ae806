//! Issuer profile registry.
//!
//! [`IssuerRegistry`] owns the in-memory map of issuer profiles and keeps it
//! in step with two parallel directories under the home root:
//!
//! - `issuers/<id>.yaml` holds each profile's configuration;
//! - `sessions/<id>.json` holds each profile's tokens.
//!
//! The two files are written separately so that logging in or out never
//! touches client registration data. Saving a profile writes both and rolls
//! the configuration file back if either write or the read-back fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use nvl_core::{IssuerProfile, IssuerRegistry, NvlHome};
//!
//! let mut registry = IssuerRegistry::open(NvlHome::resolve(None)?)?;
//! registry.save(
//!     &IssuerProfile::new("Staging").with_issuer("https://auth.staging.example"),
//!     None,
//! )?;
//! let profile = registry.load(None, true)?;
//! ```

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{GlobalConfig, NvlHome};
use crate::model::{IssuerId, IssuerProfile, LEGACY_KEYS, Session};
use crate::prompt::{Choice, Chooser, PromptError};
use crate::resolve::{Resolution, SelectOptions, resolve};
use crate::store::{FileStore, Format, StoreError, WriteMode, rename_in};

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The named issuer is not configured.
    #[error("cannot find configuration for issuer '{id}'")]
    NotFound { id: String },

    /// No issuers are configured at all.
    #[error("no configured issuers; run `nvl issuer add` to register one")]
    NoIssuers,

    /// Several issuers are configured and none was selected.
    #[error(
        "multiple configured issuers but no default set; \
         name an issuer or run `nvl issuer default --set`"
    )]
    AmbiguousChoice,

    /// The profile cannot be stored.
    #[error("invalid issuer profile: {message}")]
    InvalidProfile { message: String },

    /// Error from the file store.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error while asking the operator.
    #[error("issuer selection failed: {0}")]
    Prompt(#[from] PromptError),
}

/// Registry of configured issuer profiles.
pub struct IssuerRegistry {
    home: NvlHome,
    files: FileStore,
    config: GlobalConfig,
    issuers: BTreeMap<IssuerId, IssuerProfile>,
}

impl IssuerRegistry {
    /// Open the registry rooted at `home` and load every profile.
    pub fn open(home: NvlHome) -> Result<Self, RegistryError> {
        Self::with_store(home, FileStore::with_default_formats())
    }

    /// Open the registry using a specific file store.
    pub fn with_store(home: NvlHome, files: FileStore) -> Result<Self, RegistryError> {
        let config = GlobalConfig::load(&files, &home)?;
        let mut registry = Self {
            home,
            files,
            config,
            issuers: BTreeMap::new(),
        };
        registry.refresh()?;
        Ok(registry)
    }

    /// The home layout this registry reads from.
    pub fn home(&self) -> &NvlHome {
        &self.home
    }

    /// The global settings.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// Rebuild the in-memory map from disk.
    ///
    /// A file that cannot be read or parsed is logged and skipped. Session
    /// files without a matching configuration file are ignored.
    pub fn refresh(&mut self) -> Result<&BTreeMap<IssuerId, IssuerProfile>, RegistryError> {
        let issuers_dir = self.home.issuers_dir();
        let sessions_dir = self.home.sessions_dir();
        create_dir(&issuers_dir)?;
        create_dir(&sessions_dir)?;

        self.issuers.clear();

        for (id, path) in list_files(&issuers_dir, &Format::yaml())? {
            match self.read_config(&path) {
                Ok(mut profile) => {
                    if profile.name.is_none() {
                        profile.name = Some(id.humanize());
                    }
                    profile.id = Some(id.clone());
                    profile.session = Session::default();
                    self.issuers.insert(id, profile);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable issuer configuration");
                }
            }
        }

        for (id, path) in list_files(&sessions_dir, &Format::json())? {
            let Some(profile) = self.issuers.get_mut(&id) else {
                debug!(path = %path.display(), "ignoring session without issuer configuration");
                continue;
            };
            match self.files.read::<Session>(&path, &Format::json()) {
                Ok(session) => profile.session = session,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable session");
                }
            }
        }

        debug!(count = self.issuers.len(), "loaded issuer profiles");
        Ok(&self.issuers)
    }

    /// All profiles, ordered by id.
    pub fn list(&self) -> Vec<IssuerProfile> {
        self.issuers.values().cloned().collect()
    }

    /// Look up a profile by id without any selection rules.
    pub fn get(&self, id: &IssuerId) -> Option<&IssuerProfile> {
        self.issuers.get(id)
    }

    /// Resolve a profile non-interactively.
    ///
    /// See [`crate::resolve`] for the rules. Ambiguity is an error.
    pub fn load(
        &self,
        id: Option<&IssuerId>,
        use_default: bool,
    ) -> Result<IssuerProfile, RegistryError> {
        let options = SelectOptions {
            choice: id.cloned(),
            use_default,
            always_prompt: false,
        };
        self.select(&options)
    }

    /// Resolve a profile, asking `chooser` when the choice is ambiguous.
    pub async fn prompt(
        &self,
        options: &SelectOptions,
        chooser: &dyn Chooser,
    ) -> Result<IssuerProfile, RegistryError> {
        if options.always_prompt && options.choice.is_none() && !self.issuers.is_empty() {
            return self.choose(chooser).await;
        }

        match self.select(options) {
            Err(RegistryError::AmbiguousChoice) => self.choose(chooser).await,
            result => result,
        }
    }

    /// Store a profile and return it as the registry now holds it.
    ///
    /// The id is `id`, else `profile.id`, else the slug of `profile.name`.
    /// Legacy keys in an existing file are renamed first, then the
    /// configuration is merged onto it and the session file is written. If
    /// any step fails the configuration file is restored and the in-memory
    /// map is left unchanged. `profile` itself is never modified.
    pub fn save(
        &mut self,
        profile: &IssuerProfile,
        id: Option<&IssuerId>,
    ) -> Result<IssuerProfile, RegistryError> {
        let id = effective_id(profile, id)?;
        let config_path = self.home.issuer_file(&id);

        let previous = self.files.snapshot(&config_path)?;
        let stored = match self.write_profile(&id, profile) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(issuer = %id, error = %e, "save failed, restoring issuer configuration");
                if let Err(restore_error) = self.files.restore(&config_path, previous) {
                    error!(issuer = %id, error = %restore_error, "failed to restore issuer configuration");
                }
                return Err(e.into());
            }
        };

        self.issuers.insert(id.clone(), stored.clone());
        info!(issuer = %id, "saved issuer profile");
        Ok(stored)
    }

    /// Remove configuration keys of a stored profile.
    ///
    /// `save` merges, so this is the only way to drop an optional key such
    /// as [`crate::model::CA_CERT_KEY`] from an existing file.
    pub fn unset(&mut self, id: &IssuerId, keys: &[&str]) -> Result<IssuerProfile, RegistryError> {
        if !self.issuers.contains_key(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }

        let config_path = self.home.issuer_file(id);
        if self.files.remove_keys(&config_path, &Format::yaml(), keys)? {
            debug!(issuer = %id, ?keys, "removed configuration keys");
        }

        let stored = self.read_profile(id)?;
        self.issuers.insert(id.clone(), stored.clone());
        Ok(stored)
    }

    /// Replace the stored session of a configured issuer.
    ///
    /// Only the session file is written; configuration is untouched.
    pub fn save_session(
        &mut self,
        id: &IssuerId,
        session: &Session,
    ) -> Result<IssuerProfile, RegistryError> {
        self.write_session(id, session, WriteMode::Merge)
    }

    /// Forget the tokens of a configured issuer.
    pub fn clear_session(&mut self, id: &IssuerId) -> Result<IssuerProfile, RegistryError> {
        self.write_session(id, &Session::default(), WriteMode::Overwrite)
    }

    /// Delete a profile's configuration and session by id.
    ///
    /// Files that are already gone are not an error. If the profile was the
    /// default issuer, the default is cleared.
    pub fn delete_by_id(&mut self, id: &IssuerId) -> Result<(), RegistryError> {
        self.files.delete(&self.home.issuer_file(id))?;
        self.files.delete(&self.home.session_file(id))?;
        self.issuers.remove(id);
        info!(issuer = %id, "deleted issuer profile");

        if self.config.default_issuer.as_ref() == Some(id) {
            self.clear_default()?;
        }
        Ok(())
    }

    /// Delete the stored copy of `profile`.
    pub fn delete_by_profile(&mut self, profile: &IssuerProfile) -> Result<(), RegistryError> {
        let id = effective_id(profile, None)?;
        self.delete_by_id(&id)
    }

    /// The configured default issuer id, whether or not it still exists.
    pub fn default_issuer(&self) -> Option<&IssuerId> {
        self.config.default_issuer.as_ref()
    }

    /// Make `id` the default issuer.
    pub fn set_default(&mut self, id: &IssuerId) -> Result<(), RegistryError> {
        if !self.issuers.contains_key(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }
        self.config.default_issuer = Some(id.clone());
        self.config.save(&self.files, &self.home)?;
        info!(issuer = %id, "set default issuer");
        Ok(())
    }

    /// Remove the default issuer setting.
    pub fn clear_default(&mut self) -> Result<(), RegistryError> {
        if self.config.default_issuer.take().is_some() {
            self.config.save(&self.files, &self.home)?;
            info!("cleared default issuer");
        }
        Ok(())
    }

    fn select(&self, options: &SelectOptions) -> Result<IssuerProfile, RegistryError> {
        let resolution = resolve(&self.issuers, self.config.default_issuer.as_ref(), options)?;
        match resolution {
            Resolution::Explicit(id) | Resolution::Single(id) | Resolution::Default(id) => {
                debug!(issuer = %id, ?resolution, "resolved issuer");
                Ok(self.issuers[id].clone())
            }
            Resolution::Empty => Err(RegistryError::NoIssuers),
            Resolution::Ambiguous => Err(RegistryError::AmbiguousChoice),
        }
    }

    async fn choose(&self, chooser: &dyn Chooser) -> Result<IssuerProfile, RegistryError> {
        let choices: Vec<Choice> = self
            .issuers
            .iter()
            .map(|(id, profile)| Choice::new(profile.display_name(), id.as_str()))
            .collect();

        let picked = chooser
            .choose("Select an issuer to manage", &choices)
            .await?;
        let id = IssuerId::new(picked);

        self.issuers
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    fn write_session(
        &mut self,
        id: &IssuerId,
        session: &Session,
        mode: WriteMode,
    ) -> Result<IssuerProfile, RegistryError> {
        if !self.issuers.contains_key(id) {
            return Err(RegistryError::NotFound { id: id.to_string() });
        }

        let path = self.home.session_file(id);
        self.files.write(&path, session, &Format::json(), mode)?;
        let stored: Session = self.files.read(&path, &Format::json())?;

        let profile = self
            .issuers
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;
        profile.session = stored;
        debug!(issuer = %id, logged_in = profile.session.is_logged_in(), "wrote session");
        Ok(profile.clone())
    }

    fn write_profile(
        &self,
        id: &IssuerId,
        profile: &IssuerProfile,
    ) -> Result<IssuerProfile, StoreError> {
        let config_path = self.home.issuer_file(id);
        if self
            .files
            .rename_keys(&config_path, &Format::yaml(), LEGACY_KEYS)?
        {
            debug!(issuer = %id, "renamed legacy configuration keys");
        }

        self.files
            .write(&config_path, profile, &Format::yaml(), WriteMode::Merge)?;
        self.files.write(
            &self.home.session_file(id),
            &profile.session,
            &Format::json(),
            WriteMode::Merge,
        )?;
        self.read_profile(id)
    }

    /// Parse a configuration file, accepting keys written by older releases.
    fn read_config(&self, path: &Path) -> Result<IssuerProfile, StoreError> {
        let mut value = self.files.read_value(path, &Format::yaml())?;
        if let Value::Object(fields) = &mut value {
            rename_in(fields, LEGACY_KEYS);
        }
        serde_json::from_value(value).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Read one profile back from disk, the same way `refresh` does.
    fn read_profile(&self, id: &IssuerId) -> Result<IssuerProfile, StoreError> {
        let mut profile = self.read_config(&self.home.issuer_file(id))?;
        if profile.name.is_none() {
            profile.name = Some(id.humanize());
        }
        profile.id = Some(id.clone());
        profile.session = self
            .files
            .read(&self.home.session_file(id), &Format::json())?;
        Ok(profile)
    }
}

impl std::fmt::Debug for IssuerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerRegistry")
            .field("home", &self.home)
            .field("issuers", &self.issuers.keys().collect::<Vec<_>>())
            .field("default_issuer", &self.config.default_issuer)
            .finish()
    }
}

fn effective_id(profile: &IssuerProfile, id: Option<&IssuerId>) -> Result<IssuerId, RegistryError> {
    let id = id
        .cloned()
        .or_else(|| profile.derived_id())
        .ok_or_else(|| RegistryError::InvalidProfile {
            message: "cannot determine issuer id; set an id or a name".to_string(),
        })?;

    if !id.is_valid() {
        return Err(RegistryError::InvalidProfile {
            message: format!("'{}' cannot be used as an issuer id", id),
        });
    }
    Ok(id)
}

fn create_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Files in `dir` with the format's extension, keyed by file stem.
fn list_files(
    dir: &Path,
    format: &Format,
) -> Result<Vec<(IssuerId, std::path::PathBuf)>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };

        if path.extension().and_then(|e| e.to_str()) != Some(format.extension()) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((IssuerId::new(stem), path.clone()));
        }
    }
    Ok(files)
}

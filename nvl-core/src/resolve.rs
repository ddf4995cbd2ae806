//! Selection of the issuer a command operates against.
//!
//! This module provides:
//! - [`SelectOptions`] - What the caller asked for
//! - [`Resolution`] - Which rule picked the issuer, or why none was picked
//! - [`resolve`] - The decision procedure itself
//!
//! Rules, in order: an explicit choice always wins (and fails if unknown);
//! no profiles at all is [`Resolution::Empty`]; a single profile wins
//! regardless of the default; with several profiles the default applies if
//! allowed and it still exists; anything else is [`Resolution::Ambiguous`].

use std::collections::BTreeMap;
use tracing::warn;

use crate::model::IssuerId;
use crate::registry::RegistryError;

/// Options for resolving an issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOptions {
    /// Issuer named by the operator.
    pub choice: Option<IssuerId>,

    /// Whether the configured default may break a tie.
    pub use_default: bool,

    /// Ask the operator even when the choice is not ambiguous.
    ///
    /// Only honoured by interactive resolution and ignored when `choice` is set.
    pub always_prompt: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            choice: None,
            use_default: true,
            always_prompt: false,
        }
    }
}

impl SelectOptions {
    /// Resolve with the default rules and an optional explicit choice.
    pub fn new(choice: Option<IssuerId>) -> Self {
        Self {
            choice,
            ..Self::default()
        }
    }

    /// Ignore the configured default issuer.
    pub fn without_default(mut self) -> Self {
        self.use_default = false;
        self
    }

    /// Force an interactive choice when no issuer is named.
    pub fn always_prompt(mut self) -> Self {
        self.always_prompt = true;
        self
    }
}

/// Outcome of resolving an issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// The explicitly named issuer.
    Explicit(&'a IssuerId),

    /// The only configured issuer.
    Single(&'a IssuerId),

    /// The configured default issuer.
    Default(&'a IssuerId),

    /// Several issuers and nothing to choose between them.
    Ambiguous,

    /// No issuers configured.
    Empty,
}

impl<'a> Resolution<'a> {
    /// The selected id, if the resolution picked one.
    pub fn id(&self) -> Option<&'a IssuerId> {
        match *self {
            Self::Explicit(id) | Self::Single(id) | Self::Default(id) => Some(id),
            Self::Ambiguous | Self::Empty => None,
        }
    }
}

/// Decide which of `issuers` a command should use.
///
/// Returned ids borrow from the map's keys. Fails with
/// [`RegistryError::NotFound`] only when an explicit choice is unknown.
pub fn resolve<'a, V>(
    issuers: &'a BTreeMap<IssuerId, V>,
    default: Option<&IssuerId>,
    options: &SelectOptions,
) -> Result<Resolution<'a>, RegistryError> {
    if let Some(choice) = &options.choice {
        return issuers
            .get_key_value(choice)
            .map(|(id, _)| Resolution::Explicit(id))
            .ok_or_else(|| RegistryError::NotFound {
                id: choice.to_string(),
            });
    }

    let mut ids = issuers.keys();
    match (ids.next(), ids.next()) {
        (None, _) => return Ok(Resolution::Empty),
        (Some(only), None) => return Ok(Resolution::Single(only)),
        _ => {}
    }

    if !options.use_default {
        return Ok(Resolution::Ambiguous);
    }

    match default {
        Some(default) => match issuers.get_key_value(default) {
            Some((id, _)) => Ok(Resolution::Default(id)),
            None => {
                warn!(issuer = %default, "default issuer is not configured, ignoring it");
                Ok(Resolution::Ambiguous)
            }
        },
        None => Ok(Resolution::Ambiguous),
    }
}

//! The seam between the registry and whatever asks the operator.
//!
//! The registry only needs one interaction: present labeled choices and get
//! back the value of the one picked. Frontends implement [`Chooser`].

use async_trait::async_trait;
use thiserror::Error;

/// One entry in a selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Text shown to the operator.
    pub label: String,

    /// Value returned when this entry is picked.
    pub value: String,
}

impl Choice {
    /// Create a choice.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Error type for interactive selection.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Input ended before a choice was made.
    #[error("no selection made")]
    Cancelled,

    /// The answer does not match any choice.
    #[error("invalid selection: {input}")]
    InvalidSelection { input: String },

    /// Reading from or writing to the terminal failed.
    #[error("prompt I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Presents a list of choices and returns the selected value.
#[async_trait]
pub trait Chooser: Send + Sync {
    /// Ask the operator to pick one of `choices`.
    async fn choose(&self, message: &str, choices: &[Choice]) -> Result<String, PromptError>;
}

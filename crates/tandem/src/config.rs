//! Store configuration.

use serde::{Deserialize, Serialize};

/// What to do when an effect settles on a side that has no label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLabelPolicy {
    /// Drop the outcome. It is still logged at debug level.
    #[default]
    Ignore,
    /// Record the outcome as an unhandled [`StoreError::UnroutedOutcome`](crate::StoreError::UnroutedOutcome).
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Attached to every log event of the store.
    pub name: String,
    pub missing_label: MissingLabelPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "store".to_string(),
            missing_label: MissingLabelPolicy::Ignore,
        }
    }
}

impl StoreConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_missing_label(mut self, policy: MissingLabelPolicy) -> Self {
        self.missing_label = policy;
        self
    }
}

//! Solver configuration.
//!
//! Hosts usually keep these next to their other checker options and hand
//! them over as JSON; every field defaults to the lenient behavior.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverSettings {
    /// `nil` is only assignable to types that include it.
    pub strict_nil: bool,
    /// Members of `any` and of unresolved (unknown-flagged) classes read as
    /// `any` instead of missing.
    pub unknown_indexable: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid solver settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl SolverSettings {
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub const fn with_strict_nil(mut self, strict_nil: bool) -> Self {
        self.strict_nil = strict_nil;
        self
    }

    pub const fn with_unknown_indexable(mut self, unknown_indexable: bool) -> Self {
        self.unknown_indexable = unknown_indexable;
        self
    }
}

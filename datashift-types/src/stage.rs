//! Transfer stages.
//!
//! A transfer always walks the same five stages in the same order. Schemas
//! come first because entities depend on them structurally, entities come
//! before links because links reference them, and configuration is last.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five fixed phases of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStage {
    Schemas,
    Entities,
    Links,
    Assets,
    Configuration,
}

/// Every stage, in execution order.
pub const TRANSFER_STAGES: [TransferStage; 5] = [
    TransferStage::Schemas,
    TransferStage::Entities,
    TransferStage::Links,
    TransferStage::Assets,
    TransferStage::Configuration,
];

impl TransferStage {
    /// Returns the lowercase stage name used in events and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Entities => "entities",
            Self::Links => "links",
            Self::Assets => "assets",
            Self::Configuration => "configuration",
        }
    }

    /// Position of the stage in [`TRANSFER_STAGES`].
    #[must_use]
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// The stage that runs after this one, if any.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        TRANSFER_STAGES.get(self.index() + 1).copied()
    }
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TRANSFER_STAGES
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

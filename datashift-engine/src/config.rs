//! Engine configuration.
//!
//! [`TransferOptions`] is what the engine consumes. It holds closures
//! (transforms) and a pluggable schema comparator, so only its plain part,
//! [`TransferSettings`], can be loaded from a file.

use crate::error::TransferResult;
use crate::integrity::{JsonSchemaComparator, SchemaComparator};
use crate::transform::{Transform, TransferTransforms};
use datashift_types::TransferStage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Default version strategy.
pub const DEFAULT_VERSION_STRATEGY: VersionStrategy = VersionStrategy::Ignore;

/// Default schema strategy.
pub const DEFAULT_SCHEMA_STRATEGY: SchemaStrategy = SchemaStrategy::Strict;

/// How far apart source and destination platform versions may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStrategy {
    /// Never compare versions.
    #[default]
    Ignore,
    /// Only prerelease/build metadata may differ.
    Patch,
    /// Patch-level differences are also allowed.
    Minor,
    /// Minor-level differences are also allowed.
    Major,
}

impl VersionStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for VersionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(format!("unknown version strategy: {other}")),
        }
    }
}

/// How strictly content-type schemas must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaStrategy {
    /// Never compare schemas.
    Ignore,
    /// Every difference counts except cosmetic attribute options.
    #[default]
    Strict,
    /// Every difference counts.
    Exact,
}

impl SchemaStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::Strict => "strict",
            Self::Exact => "exact",
        }
    }
}

impl fmt::Display for SchemaStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ignore" => Ok(Self::Ignore),
            "strict" => Ok(Self::Strict),
            "exact" => Ok(Self::Exact),
            other => Err(format!("unknown schema strategy: {other}")),
        }
    }
}

/// The serializable part of [`TransferOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferSettings {
    pub version_strategy: VersionStrategy,
    pub schema_strategy: SchemaStrategy,
}

impl TransferSettings {
    /// Parses settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> TransferResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Options for a [`TransferEngine`](crate::TransferEngine).
#[derive(Clone)]
pub struct TransferOptions {
    pub version_strategy: VersionStrategy,
    pub schema_strategy: SchemaStrategy,
    pub transforms: TransferTransforms,
    pub schema_comparator: Arc<dyn SchemaComparator>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            version_strategy: DEFAULT_VERSION_STRATEGY,
            schema_strategy: DEFAULT_SCHEMA_STRATEGY,
            transforms: TransferTransforms::default(),
            schema_comparator: Arc::new(JsonSchemaComparator),
        }
    }
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("version_strategy", &self.version_strategy)
            .field("schema_strategy", &self.schema_strategy)
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl From<TransferSettings> for TransferOptions {
    fn from(settings: TransferSettings) -> Self {
        Self {
            version_strategy: settings.version_strategy,
            schema_strategy: settings.schema_strategy,
            ..Self::default()
        }
    }
}

impl TransferOptions {
    pub fn with_version_strategy(mut self, strategy: VersionStrategy) -> Self {
        self.version_strategy = strategy;
        self
    }

    pub fn with_schema_strategy(mut self, strategy: SchemaStrategy) -> Self {
        self.schema_strategy = strategy;
        self
    }

    /// Replaces the schema comparator used by the integrity check.
    pub fn with_schema_comparator(mut self, comparator: Arc<dyn SchemaComparator>) -> Self {
        self.schema_comparator = comparator;
        self
    }

    /// Appends a transform applied to every stage.
    pub fn with_global_transform(mut self, transform: Transform) -> Self {
        self.transforms.global.push(transform);
        self
    }

    /// Appends a transform applied to `stage` only.
    pub fn with_stage_transform(mut self, stage: TransferStage, transform: Transform) -> Self {
        self.transforms.stages.entry(stage).or_default().push(transform);
        self
    }

    /// The plain settings of these options.
    pub fn settings(&self) -> TransferSettings {
        TransferSettings {
            version_strategy: self.version_strategy,
            schema_strategy: self.schema_strategy,
        }
    }
}

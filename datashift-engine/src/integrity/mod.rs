//! Compatibility checks between source and destination.
//!
//! Two checks run before any data moves:
//! - **Version**: the platform versions reported by both providers must not
//!   differ by more than the configured [`VersionStrategy`] allows.
//! - **Schema**: every content type known to either side is compared with
//!   the configured [`SchemaComparator`]; any remaining difference fails
//!   the check.

mod schema;
mod version;

pub use schema::{json_diff, JsonSchemaComparator, SchemaComparator, SchemaDiff};
pub use version::{diff_versions, VersionDiff};

use crate::config::{SchemaStrategy, TransferOptions, VersionStrategy};
use crate::error::IntegrityError;
use datashift_types::SchemaMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Runs the version and schema checks for one pair of providers.
pub struct IntegrityChecker<'a> {
    version_strategy: VersionStrategy,
    schema_strategy: SchemaStrategy,
    comparator: &'a dyn SchemaComparator,
}

impl<'a> IntegrityChecker<'a> {
    /// Uses the strategies and comparator from `options`.
    pub fn new(options: &'a TransferOptions) -> Self {
        Self {
            version_strategy: options.version_strategy,
            schema_strategy: options.schema_strategy,
            comparator: options.schema_comparator.as_ref(),
        }
    }

    /// Checks the platform versions.
    ///
    /// Passes when either version is unknown, when versions are ignored, or
    /// when both strings are identical.
    pub fn check_versions(
        &self,
        source: Option<&str>,
        destination: Option<&str>,
    ) -> Result<(), IntegrityError> {
        let strategy = self.version_strategy;
        let (Some(source), Some(destination)) = (source, destination) else {
            return Ok(());
        };
        if strategy == VersionStrategy::Ignore || source == destination {
            return Ok(());
        }

        let mismatch = || IntegrityError::VersionMismatch {
            strategy,
            source_version: source.to_string(),
            destination_version: destination.to_string(),
        };

        match diff_versions(source, destination) {
            Err(e) => {
                debug!("Could not compare versions {} and {}: {}", source, destination, e);
                Err(mismatch())
            }
            Ok(None) => Ok(()),
            Ok(Some(diff)) if strategy.allows(diff) => Ok(()),
            Ok(Some(diff)) => {
                debug!("Version diff {} not allowed by {} strategy", diff, strategy);
                Err(mismatch())
            }
        }
    }

    /// Compares every content type known to either side.
    pub fn check_schemas(
        &self,
        source: &SchemaMap,
        destination: &SchemaMap,
    ) -> Result<(), IntegrityError> {
        if self.schema_strategy == SchemaStrategy::Ignore {
            return Ok(());
        }

        let uids: BTreeSet<&String> = source.keys().chain(destination.keys()).collect();
        let mut diffs = BTreeMap::new();

        for uid in uids {
            let found = self
                .comparator
                .compare(source.get(uid), destination.get(uid), self.schema_strategy)
                .map_err(|e| IntegrityError::Unavailable(format!("comparing {uid}: {e}")))?;
            if !found.is_empty() {
                diffs.insert(uid.clone(), found);
            }
        }

        if diffs.is_empty() {
            Ok(())
        } else {
            Err(IntegrityError::SchemaMismatch { diffs })
        }
    }
}

//! Transfer progress counters.
//!
//! A [`ProgressTracker`] sits between a stage's transform and its
//! destination. For every record it sees it bumps the stage counters in a
//! [`TransferProgress`] and, when the tracker has a key function, the
//! counters of the record's aggregate. It never alters the record.

use crate::error::TransferResult;
use datashift_types::{Record, TransferStage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A count/bytes pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounter {
    pub count: u64,
    pub bytes: u64,
}

impl ProgressCounter {
    fn add(&mut self, bytes: u64) {
        self.count += 1;
        self.bytes += bytes;
    }
}

/// Counters of a single stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageProgress {
    pub count: u64,
    pub bytes: u64,
    /// Sub-totals per aggregate key. Created on the first keyed record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregates: Option<BTreeMap<String, ProgressCounter>>,
}

impl StageProgress {
    /// Counters of one aggregate key, if any record carried it.
    pub fn aggregate(&self, key: &str) -> Option<&ProgressCounter> {
        self.aggregates.as_ref().and_then(|a| a.get(key))
    }
}

/// Progress of a whole transfer, keyed by stage.
///
/// Stages appear lazily, the first time one of their records is tracked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferProgress(BTreeMap<TransferStage, StageProgress>);

impl TransferProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stage: TransferStage) -> Option<&StageProgress> {
        self.0.get(&stage)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops every counter.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransferStage, &StageProgress)> {
        self.0.iter()
    }

    /// Records one record of `bytes` bytes on `stage`, and on `key` when
    /// given.
    pub fn record(&mut self, stage: TransferStage, bytes: u64, key: Option<&str>) {
        let progress = self.0.entry(stage).or_default();
        progress.count += 1;
        progress.bytes += bytes;

        if let Some(key) = key {
            progress
                .aggregates
                .get_or_insert_with(BTreeMap::new)
                .entry(key.to_string())
                .or_default()
                .add(bytes);
        }
    }
}

/// Computes the size of a record, in bytes.
pub type SizeFn = Arc<dyn Fn(&Record) -> u64 + Send + Sync>;

/// Computes the aggregate key of a record.
pub type KeyFn = Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>;

/// Observes records flowing through a stage and counts them.
#[derive(Clone)]
pub struct ProgressTracker {
    stage: TransferStage,
    size: Option<SizeFn>,
    key: Option<KeyFn>,
}

impl ProgressTracker {
    /// A tracker sizing records by their serialized JSON and without
    /// aggregates.
    pub fn new(stage: TransferStage) -> Self {
        Self {
            stage,
            size: None,
            key: None,
        }
    }

    /// The tracker the engine uses for `stage`.
    ///
    /// Schemas are keyed by model type and entities by content type. Assets
    /// are sized by their file size and keyed by file extension.
    pub fn for_stage(stage: TransferStage) -> Self {
        let tracker = Self::new(stage);
        match stage {
            TransferStage::Schemas => {
                tracker.with_key(|record| record.as_schema().map(|s| s.model_type.clone()))
            }
            TransferStage::Entities => {
                tracker.with_key(|record| record.as_entity().map(|e| e.entity_type.clone()))
            }
            TransferStage::Assets => tracker
                .with_size(|record| record.as_asset().map_or(0, |a| a.stats.size))
                .with_key(|record| record.as_asset().map(|a| a.extension())),
            TransferStage::Links | TransferStage::Configuration => tracker,
        }
    }

    /// Overrides how record sizes are computed.
    pub fn with_size<F>(mut self, size: F) -> Self
    where
        F: Fn(&Record) -> u64 + Send + Sync + 'static,
    {
        self.size = Some(Arc::new(size));
        self
    }

    /// Sets the aggregate key function. Empty keys are ignored.
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Record) -> Option<String> + Send + Sync + 'static,
    {
        self.key = Some(Arc::new(key));
        self
    }

    pub fn stage(&self) -> TransferStage {
        self.stage
    }

    /// Counts `record` into `progress`.
    pub fn track(&self, record: &Record, progress: &mut TransferProgress) -> TransferResult<()> {
        let size = match &self.size {
            Some(size) => size(record),
            None => record.serialized_len()?,
        };
        let key = self
            .key
            .as_ref()
            .and_then(|key| key(record))
            .filter(|key| !key.is_empty());

        progress.record(self.stage, size, key.as_deref());
        Ok(())
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("stage", &self.stage)
            .field("custom_size", &self.size.is_some())
            .field("keyed", &self.key.is_some())
            .finish()
    }
}

//! In-memory providers.
//!
//! [`MemorySource`] serves fixed record lists and [`MemoryDestination`]
//! collects what it receives. They are handy for dry runs and tests: a
//! stage without records configured on the source, or not enabled on the
//! destination, is reported as unsupported and gets skipped.
//!
//! The destination buffers each stage and only commits it when the stage's
//! writer is closed, so an aborted stage leaves nothing behind.

use crate::error::{TransferError, TransferResult};
use crate::provider::{DestinationProvider, Provider, ProviderType, SourceProvider};
use crate::stream::{BoxedReader, BoxedWriter, StageWriter, StreamReader};
use async_trait::async_trait;
use datashift_types::{ProviderMetadata, Record, TransferStage, TRANSFER_STAGES};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type StageRecords = BTreeMap<TransferStage, Vec<Record>>;

/// A source serving records from memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    metadata: Option<ProviderMetadata>,
    records: StageRecords,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            records: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: ProviderMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the records of `stage`, which makes the stage supported.
    pub fn with_stage(mut self, stage: TransferStage, records: Vec<Record>) -> Self {
        self.records.insert(stage, records);
        self
    }

    /// Appends a record to the stage it belongs to.
    pub fn push(&mut self, record: impl Into<Record>) {
        let record = record.into();
        self.records.entry(record.stage()).or_default().push(record);
    }

    fn reader(&self, stage: TransferStage) -> Option<BoxedReader> {
        self.records
            .get(&stage)
            .map(|records| StreamReader::from_records(records.clone()).boxed())
    }
}

#[async_trait]
impl Provider for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Source
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        Ok(self.metadata.clone())
    }

    fn results(&self) -> Option<serde_json::Value> {
        let served: BTreeMap<TransferStage, usize> =
            self.records.iter().map(|(stage, r)| (*stage, r.len())).collect();
        Some(json!({ "served": served }))
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    async fn stream_schemas(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(self.reader(TransferStage::Schemas))
    }

    async fn stream_entities(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(self.reader(TransferStage::Entities))
    }

    async fn stream_links(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(self.reader(TransferStage::Links))
    }

    async fn stream_assets(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(self.reader(TransferStage::Assets))
    }

    async fn stream_configuration(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(self.reader(TransferStage::Configuration))
    }
}

/// Shared view of what a [`MemoryDestination`] committed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    committed: Arc<Mutex<StageRecords>>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, StageRecords> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records committed for `stage`.
    pub fn records(&self, stage: TransferStage) -> Vec<Record> {
        self.lock().get(&stage).cloned().unwrap_or_default()
    }

    /// Number of records committed across all stages.
    pub fn len(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn commit(&self, stage: TransferStage, records: Vec<Record>) {
        self.lock().entry(stage).or_default().extend(records);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// A destination collecting records in memory.
#[derive(Debug)]
pub struct MemoryDestination {
    name: String,
    metadata: Option<ProviderMetadata>,
    source_metadata: Option<ProviderMetadata>,
    supported: BTreeSet<TransferStage>,
    store: MemoryStore,
    write_limit: Option<usize>,
    rollbacks: Vec<String>,
}

impl MemoryDestination {
    /// A destination accepting every stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            source_metadata: None,
            supported: TRANSFER_STAGES.into_iter().collect(),
            store: MemoryStore::default(),
            write_limit: None,
            rollbacks: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: ProviderMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Restricts the destination to the given stages.
    pub fn with_stages(mut self, stages: impl IntoIterator<Item = TransferStage>) -> Self {
        self.supported = stages.into_iter().collect();
        self
    }

    /// Makes every stage writer fail once it holds `limit` records, to
    /// rehearse a destination running out of space.
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    /// Handle on the committed records, usable after the destination moved
    /// into an engine.
    pub fn store(&self) -> MemoryStore {
        self.store.clone()
    }

    /// Metadata received from the source.
    pub fn source_metadata(&self) -> Option<&ProviderMetadata> {
        self.source_metadata.as_ref()
    }

    /// Error messages of every rollback performed.
    pub fn rollbacks(&self) -> &[String] {
        &self.rollbacks
    }

    fn writer(&self, stage: TransferStage) -> Option<BoxedWriter> {
        self.supported.contains(&stage).then(|| {
            Box::new(MemoryWriter {
                stage,
                store: self.store.clone(),
                limit: self.write_limit,
                pending: Some(Vec::new()),
            }) as BoxedWriter
        })
    }
}

#[async_trait]
impl Provider for MemoryDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Destination
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        Ok(self.metadata.clone())
    }

    fn results(&self) -> Option<serde_json::Value> {
        let written: BTreeMap<TransferStage, usize> = self
            .store
            .lock()
            .iter()
            .map(|(stage, r)| (*stage, r.len()))
            .collect();
        Some(json!({ "written": written }))
    }
}

#[async_trait]
impl DestinationProvider for MemoryDestination {
    fn set_source_metadata(&mut self, metadata: &ProviderMetadata) {
        self.source_metadata = Some(metadata.clone());
    }

    async fn rollback(&mut self, error: &TransferError) -> TransferResult<()> {
        self.rollbacks.push(error.to_string());
        self.store.clear();
        Ok(())
    }

    async fn schemas_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(self.writer(TransferStage::Schemas))
    }

    async fn entities_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(self.writer(TransferStage::Entities))
    }

    async fn links_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(self.writer(TransferStage::Links))
    }

    async fn assets_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(self.writer(TransferStage::Assets))
    }

    async fn configuration_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(self.writer(TransferStage::Configuration))
    }
}

/// Buffers one stage and commits it on close.
struct MemoryWriter {
    stage: TransferStage,
    store: MemoryStore,
    limit: Option<usize>,
    pending: Option<Vec<Record>>,
}

#[async_trait]
impl StageWriter for MemoryWriter {
    async fn write(&mut self, record: Record) -> TransferResult<()> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| TransferError::stream(self.stage, "write after close"))?;
        if let Some(limit) = self.limit.filter(|limit| pending.len() >= *limit) {
            return Err(TransferError::stream(
                self.stage,
                format!("write limit of {limit} records reached"),
            ));
        }
        pending.push(record);
        Ok(())
    }

    async fn close(&mut self) -> TransferResult<()> {
        if let Some(records) = self.pending.take() {
            self.store.commit(self.stage, records);
        }
        Ok(())
    }

    async fn abort(&mut self) {
        self.pending = None;
    }

    fn is_closed(&self) -> bool {
        self.pending.is_none()
    }
}

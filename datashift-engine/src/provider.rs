//! Provider capability contract.
//!
//! Providers implement one side of a transfer. Every hook is optional: the
//! default implementations do nothing, and a stage factory returning `None`
//! tells the engine the provider does not take part in that stage, which
//! makes the stage runner skip it.

use crate::error::{TransferError, TransferResult};
use crate::stream::{BoxedReader, BoxedWriter};
use async_trait::async_trait;
use datashift_types::{ProviderMetadata, SchemaMap, TransferStage};
use std::fmt;

/// Which side of a transfer a provider implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Source,
    Destination,
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Destination => f.write_str("destination"),
        }
    }
}

/// Hooks shared by both sides.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    /// The side this provider implements. Checked when the engine is built.
    fn provider_type(&self) -> ProviderType;

    /// Opens connections and other resources.
    async fn bootstrap(&mut self) -> TransferResult<()> {
        Ok(())
    }

    /// Releases everything opened by [`bootstrap`](Self::bootstrap).
    async fn close(&mut self) -> TransferResult<()> {
        Ok(())
    }

    /// Runs right before the first stage.
    async fn before_transfer(&mut self) -> TransferResult<()> {
        Ok(())
    }

    /// Platform version and schemas of this side.
    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>>;

    /// Schemas of this side, when they are not part of the metadata.
    async fn get_schemas(&mut self) -> TransferResult<Option<SchemaMap>> {
        Ok(None)
    }

    /// Provider-specific results, reported once the transfer is done.
    fn results(&self) -> Option<serde_json::Value> {
        None
    }
}

/// The side records are read from.
#[async_trait]
pub trait SourceProvider: Provider {
    async fn stream_schemas(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(None)
    }

    async fn stream_entities(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(None)
    }

    async fn stream_links(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(None)
    }

    async fn stream_assets(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(None)
    }

    async fn stream_configuration(&mut self) -> TransferResult<Option<BoxedReader>> {
        Ok(None)
    }

    /// The reader for `stage`.
    async fn stage_reader(&mut self, stage: TransferStage) -> TransferResult<Option<BoxedReader>> {
        match stage {
            TransferStage::Schemas => self.stream_schemas().await,
            TransferStage::Entities => self.stream_entities().await,
            TransferStage::Links => self.stream_links().await,
            TransferStage::Assets => self.stream_assets().await,
            TransferStage::Configuration => self.stream_configuration().await,
        }
    }
}

/// The side records are written to.
#[async_trait]
pub trait DestinationProvider: Provider {
    /// Receives the source's metadata before integrity checks run.
    fn set_source_metadata(&mut self, metadata: &ProviderMetadata) {
        let _ = metadata;
    }

    /// Undoes whatever was written, after `error` aborted the transfer.
    async fn rollback(&mut self, error: &TransferError) -> TransferResult<()> {
        let _ = error;
        Ok(())
    }

    async fn schemas_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(None)
    }

    async fn entities_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(None)
    }

    async fn links_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(None)
    }

    async fn assets_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(None)
    }

    async fn configuration_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        Ok(None)
    }

    /// The writer for `stage`.
    async fn stage_writer(&mut self, stage: TransferStage) -> TransferResult<Option<BoxedWriter>> {
        match stage {
            TransferStage::Schemas => self.schemas_writer().await,
            TransferStage::Entities => self.entities_writer().await,
            TransferStage::Links => self.links_writer().await,
            TransferStage::Assets => self.assets_writer().await,
            TransferStage::Configuration => self.configuration_writer().await,
        }
    }
}

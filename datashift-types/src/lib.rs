//! Core type definitions for datashift.
//!
//! This crate defines the plain data model shared by the transfer engine and
//! by provider implementations:
//! - [`TransferStage`] and the fixed stage order ([`TRANSFER_STAGES`])
//! - The records that flow through each stage ([`Entity`], [`Link`],
//!   [`Asset`], [`ConfigurationEntry`], [`SchemaDescriptor`]) and the
//!   stage-agnostic [`Record`] wrapper
//! - Provider metadata used for compatibility checks ([`ProviderMetadata`])
//!
//! Nothing here performs I/O. How records are read or written is entirely
//! up to the providers.

mod metadata;
mod record;
mod stage;

pub use metadata::{AttributeDescriptor, PlatformInfo, ProviderMetadata, SchemaDescriptor, SchemaMap};
pub use record::{
    Asset, AssetStats, ConfigurationEntry, Entity, Link, LinkEndpoint, Record,
};
pub use stage::{TransferStage, TRANSFER_STAGES};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown transfer stage: {0}")]
    UnknownStage(String),
}

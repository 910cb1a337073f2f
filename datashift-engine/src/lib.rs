//! Staged data-transfer engine for datashift.
//!
//! Moves a structured dataset from a source provider to a destination
//! provider, one stage at a time, while tracking progress, checking that
//! both sides are compatible and rolling the destination back on failure.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Transform**: composes the global and per-stage filter/map transforms
//! - **Progress**: counts records and bytes per stage and per aggregate key
//! - **Integrity**: compares platform versions and content-type schemas
//! - **Runner**: pipes one stage from its reader to its writer
//! - **Engine**: sequences a whole transfer and handles rollback
//!
//! ## Transfer Process
//!
//! 1. **Bootstrap**: both providers open their resources
//! 2. **Init**: metadata of both sides is resolved and cached
//! 3. **Integrity**: versions and schemas are checked, nothing moves if
//!    they are incompatible
//! 4. **Stages**: schemas, entities, links, assets, configuration, in
//!    that order, each skipped when one side does not support it
//! 5. **Close**: both providers release their resources
//!
//! # Example
//!
//! ```
//! use datashift_engine::memory::{MemoryDestination, MemorySource};
//! use datashift_engine::{TransferEngine, TransferOptions};
//! use datashift_types::{Entity, TransferStage};
//!
//! # tokio_test_block(async {
//! let source = MemorySource::new("memory-source")
//!     .with_stage(TransferStage::Entities, vec![Entity::new(1, "a").into()]);
//! let destination = MemoryDestination::new("memory-destination");
//! let store = destination.store();
//!
//! let mut engine = TransferEngine::new(source, destination, TransferOptions::default()).unwrap();
//! let results = engine.transfer().await.unwrap();
//!
//! assert_eq!(results.engine.get(TransferStage::Entities).unwrap().count, 1);
//! assert_eq!(store.records(TransferStage::Entities).len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
mod engine;
mod error;
pub mod event;
pub mod integrity;
pub mod memory;
pub mod progress;
pub mod provider;
pub mod runner;
pub mod stream;
pub mod transform;

pub use config::{
    SchemaStrategy, TransferOptions, TransferSettings, VersionStrategy, DEFAULT_SCHEMA_STRATEGY,
    DEFAULT_VERSION_STRATEGY,
};
pub use engine::{create_transfer_engine, EngineState, TransferEngine, TransferResults};
pub use error::{IntegrityError, TransferError, TransferResult};
pub use event::{ChannelObserver, EventBus, TransferEvent, TransferObserver};
pub use integrity::{
    IntegrityChecker, JsonSchemaComparator, SchemaComparator, SchemaDiff, VersionDiff,
};
pub use progress::{ProgressCounter, ProgressTracker, StageProgress, TransferProgress};
pub use provider::{DestinationProvider, Provider, ProviderType, SourceProvider};
pub use runner::{StageJob, StageRunner};
pub use stream::{
    BoxedReader, BoxedWriter, ChannelReader, ChannelWriter, StageReader, StageWriter,
    StreamReader,
};
pub use transform::{StageTransform, Transform, TransferTransforms};

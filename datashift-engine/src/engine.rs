//! Transfer engine: sequences a whole transfer.
//!
//! `transfer()` walks the providers through bootstrap, metadata resolution,
//! the integrity check, the five stages in order and a final close. Any
//! error on the way triggers a rollback of the destination before it is
//! returned to the caller.

use crate::config::TransferOptions;
use crate::error::{IntegrityError, TransferError, TransferResult};
use crate::event::{EventBus, TransferEvent, TransferObserver};
use crate::integrity::IntegrityChecker;
use crate::progress::{ProgressTracker, TransferProgress};
use crate::provider::{DestinationProvider, ProviderType, SourceProvider};
use crate::runner::{StageJob, StageRunner};
use crate::transform::StageTransform;
use datashift_types::{ProviderMetadata, SchemaMap, TransferStage, TRANSFER_STAGES};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a transfer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Bootstrapping,
    ResolvingMetadata,
    CheckingIntegrity,
    BeforeTransfer,
    Stage(TransferStage),
    Closing,
    Finished,
    Errored,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Bootstrapping => f.write_str("bootstrapping"),
            Self::ResolvingMetadata => f.write_str("resolving-metadata"),
            Self::CheckingIntegrity => f.write_str("checking-integrity"),
            Self::BeforeTransfer => f.write_str("before-transfer"),
            Self::Stage(stage) => write!(f, "stage:{stage}"),
            Self::Closing => f.write_str("closing"),
            Self::Finished => f.write_str("finished"),
            Self::Errored => f.write_str("errored"),
        }
    }
}

/// Outcome of a successful transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferResults {
    /// Identifier of the run, also attached to its log lines.
    pub transfer_id: Uuid,
    pub source: Option<serde_json::Value>,
    pub destination: Option<serde_json::Value>,
    pub engine: TransferProgress,
}

/// Metadata resolved from both providers for the current transfer.
#[derive(Debug, Clone, Default)]
struct ResolvedMetadata {
    source: Option<ProviderMetadata>,
    destination: Option<ProviderMetadata>,
}

/// Moves data from a source provider to a destination provider.
///
/// One engine runs one transfer at a time; `transfer()` borrows it mutably
/// for the whole run.
pub struct TransferEngine<S, D> {
    source: S,
    destination: D,
    options: TransferOptions,
    metadata: ResolvedMetadata,
    progress: TransferProgress,
    events: EventBus,
    state: EngineState,
}

/// Builds a [`TransferEngine`], checking the provider types.
pub fn create_transfer_engine<S, D>(
    source: S,
    destination: D,
    options: TransferOptions,
) -> TransferResult<TransferEngine<S, D>>
where
    S: SourceProvider,
    D: DestinationProvider,
{
    TransferEngine::new(source, destination, options)
}

impl<S, D> TransferEngine<S, D>
where
    S: SourceProvider,
    D: DestinationProvider,
{
    /// Creates an engine.
    ///
    /// Fails with [`TransferError::Configuration`] when a provider reports
    /// the wrong [`ProviderType`].
    pub fn new(source: S, destination: D, options: TransferOptions) -> TransferResult<Self> {
        if source.provider_type() != ProviderType::Source {
            return Err(TransferError::Configuration(format!(
                "source provider {} does not have type 'source'",
                source.name()
            )));
        }
        if destination.provider_type() != ProviderType::Destination {
            return Err(TransferError::Configuration(format!(
                "destination provider {} does not have type 'destination'",
                destination.name()
            )));
        }

        Ok(Self {
            source,
            destination,
            options,
            metadata: ResolvedMetadata::default(),
            progress: TransferProgress::new(),
            events: EventBus::new(),
            state: EngineState::Idle,
        })
    }

    /// Registers an observer for lifecycle and progress events.
    pub fn subscribe(&mut self, observer: Arc<dyn TransferObserver>) {
        self.events.subscribe(observer);
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Progress of the current or last transfer. After a failed transfer
    /// this shows how far each stage got.
    pub fn progress(&self) -> &TransferProgress {
        &self.progress
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Consumes the engine, returning both providers.
    pub fn into_providers(self) -> (S, D) {
        (self.source, self.destination)
    }

    /// Runs a whole transfer.
    ///
    /// On failure the destination is rolled back with the error and the
    /// error is returned unchanged. If the rollback fails too, both errors
    /// are returned as [`TransferError::Rollback`].
    pub async fn transfer(&mut self) -> TransferResult<TransferResults> {
        let transfer_id = Uuid::now_v7();
        self.progress.clear();
        self.state = EngineState::Idle;
        info!(
            "Transfer {} from {} to {} requested",
            transfer_id,
            self.source.name(),
            self.destination.name()
        );
        self.events.emit(TransferEvent::TransferInit);

        match self.run().await {
            Ok(()) => {
                self.state = EngineState::Finished;
                info!("Transfer {} finished", transfer_id);
                Ok(TransferResults {
                    transfer_id,
                    source: self.source.results(),
                    destination: self.destination.results(),
                    engine: self.progress.clone(),
                })
            }
            Err(e) => {
                let failed_in = self.state;
                self.state = EngineState::Errored;
                error!("Transfer {} failed during {}: {}", transfer_id, failed_in, e);
                self.events.emit(TransferEvent::TransferError {
                    message: e.to_string(),
                    state: failed_in,
                });

                if let Err(rollback) = self.destination.rollback(&e).await {
                    error!(
                        "Rollback of {} failed: {}",
                        self.destination.name(),
                        rollback
                    );
                    return Err(TransferError::Rollback {
                        cause: Box::new(e),
                        rollback: Box::new(rollback),
                    });
                }
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> TransferResult<()> {
        self.bootstrap().await?;
        self.init().await?;

        self.state = EngineState::CheckingIntegrity;
        if let Err(report) = self.verify_integrity().await {
            self.log_integrity_failure(&report);
            return Err(TransferError::Integrity {
                source_name: self.source.name().to_string(),
                destination_name: self.destination.name().to_string(),
                report,
            });
        }

        self.events.emit(TransferEvent::TransferStart);
        self.before_transfer().await?;

        for stage in TRANSFER_STAGES {
            self.transfer_stage(stage).await?;
        }

        self.close().await?;
        self.events.emit(TransferEvent::TransferFinish);
        Ok(())
    }

    /// Bootstraps both providers concurrently.
    pub async fn bootstrap(&mut self) -> TransferResult<()> {
        self.state = EngineState::Bootstrapping;
        let results = tokio::join!(self.source.bootstrap(), self.destination.bootstrap());
        self.settle("bootstrap", results)
    }

    /// Resolves both providers' metadata and hands the source's to the
    /// destination.
    pub async fn init(&mut self) -> TransferResult<()> {
        self.state = EngineState::ResolvingMetadata;
        self.metadata = ResolvedMetadata {
            source: self.source.get_metadata().await?,
            destination: self.destination.get_metadata().await?,
        };

        if let Some(source_metadata) = &self.metadata.source {
            self.destination.set_source_metadata(source_metadata);
        }
        Ok(())
    }

    /// Runs the `before_transfer` hooks of both providers concurrently.
    pub async fn before_transfer(&mut self) -> TransferResult<()> {
        self.state = EngineState::BeforeTransfer;
        let results = tokio::join!(
            self.source.before_transfer(),
            self.destination.before_transfer()
        );
        self.settle("before_transfer", results)
    }

    /// Closes both providers concurrently.
    pub async fn close(&mut self) -> TransferResult<()> {
        self.state = EngineState::Closing;
        let results = tokio::join!(self.source.close(), self.destination.close());
        self.settle("close", results)
    }

    /// Both sides of a hook run to completion; the source's error wins when
    /// both fail.
    fn settle(
        &self,
        hook: &str,
        results: (TransferResult<()>, TransferResult<()>),
    ) -> TransferResult<()> {
        match results {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(source_err), Err(destination_err)) => {
                warn!(
                    "{} of {} failed as well: {}",
                    hook,
                    self.destination.name(),
                    destination_err
                );
                Err(source_err)
            }
        }
    }

    /// Checks that source and destination are compatible.
    ///
    /// Never fails: problems are logged and reported as `false`. Uses the
    /// metadata resolved by [`init`](Self::init).
    pub async fn integrity_check(&mut self) -> bool {
        match self.verify_integrity().await {
            Ok(()) => true,
            Err(report) => {
                self.log_integrity_failure(&report);
                false
            }
        }
    }

    async fn verify_integrity(&mut self) -> Result<(), IntegrityError> {
        let checker = IntegrityChecker::new(&self.options);

        let source_version = self.metadata.source.as_ref().and_then(|m| m.version());
        let destination_version = self.metadata.destination.as_ref().and_then(|m| m.version());
        checker.check_versions(source_version, destination_version)?;

        let source_schemas = Self::resolve_schemas(
            self.source.get_schemas().await,
            self.metadata.source.as_ref(),
        )?;
        let destination_schemas = Self::resolve_schemas(
            self.destination.get_schemas().await,
            self.metadata.destination.as_ref(),
        )?;

        if let (Some(source), Some(destination)) = (source_schemas, destination_schemas) {
            checker.check_schemas(&source, &destination)?;
        } else {
            debug!("Schemas unavailable on one side, skipping schema check");
        }
        Ok(())
    }

    fn resolve_schemas(
        fetched: TransferResult<Option<SchemaMap>>,
        metadata: Option<&ProviderMetadata>,
    ) -> Result<Option<SchemaMap>, IntegrityError> {
        let fetched = fetched.map_err(|e| IntegrityError::Unavailable(e.to_string()))?;
        Ok(fetched.or_else(|| metadata.and_then(|m| m.schemas.clone())))
    }

    fn log_integrity_failure(&self, report: &IntegrityError) {
        error!(
            "Integrity check between {} and {} failed: {}",
            self.source.name(),
            self.destination.name(),
            report
        );
        if let IntegrityError::SchemaMismatch { diffs } = report {
            match serde_json::to_string_pretty(diffs) {
                Ok(detail) => error!("Schema differences:\n{}", detail),
                Err(e) => error!("Schema differences could not be rendered: {}", e),
            }
        }
    }

    /// The transform pipeline for `stage`, global transforms included.
    pub fn stage_transform(&self, stage: TransferStage) -> StageTransform {
        self.options.transforms.build_stage_transform(stage, true)
    }

    /// Runs a single stage with its default tracker.
    pub async fn transfer_stage(&mut self, stage: TransferStage) -> TransferResult<()> {
        self.state = EngineState::Stage(stage);

        let source = self.source.stage_reader(stage).await?;
        let destination = self.destination.stage_writer(stage).await?;

        let job = StageJob::new(stage)
            .with_source(source)
            .with_destination(destination)
            .with_transform(self.stage_transform(stage))
            .with_tracker(ProgressTracker::for_stage(stage));

        StageRunner::new(&mut self.progress, &self.events)
            .run(job)
            .await
    }

    pub async fn transfer_schemas(&mut self) -> TransferResult<()> {
        self.transfer_stage(TransferStage::Schemas).await
    }

    pub async fn transfer_entities(&mut self) -> TransferResult<()> {
        self.transfer_stage(TransferStage::Entities).await
    }

    pub async fn transfer_links(&mut self) -> TransferResult<()> {
        self.transfer_stage(TransferStage::Links).await
    }

    pub async fn transfer_assets(&mut self) -> TransferResult<()> {
        self.transfer_stage(TransferStage::Assets).await
    }

    pub async fn transfer_configuration(&mut self) -> TransferResult<()> {
        self.transfer_stage(TransferStage::Configuration).await
    }
}

impl<S, D> fmt::Debug for TransferEngine<S, D>
where
    S: SourceProvider,
    D: DestinationProvider,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEngine")
            .field("source", &self.source.name())
            .field("destination", &self.destination.name())
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

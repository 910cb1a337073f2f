//! Stage runner: couples one stage's reader and writer.
//!
//! Records travel `source -> transform -> tracker -> destination` one at a
//! time: the next record is only pulled once the destination accepted the
//! previous one. The first error from any segment aborts both ends and is
//! returned as is.

use crate::error::TransferResult;
use crate::event::{EventBus, TransferEvent};
use crate::progress::{ProgressTracker, TransferProgress};
use crate::stream::{BoxedReader, BoxedWriter, StageReader, StageWriter};
use crate::transform::StageTransform;
use datashift_types::TransferStage;
use tracing::{debug, info, warn};

/// Everything needed to run one stage.
pub struct StageJob {
    pub stage: TransferStage,
    pub source: Option<BoxedReader>,
    pub destination: Option<BoxedWriter>,
    pub transform: Option<StageTransform>,
    pub tracker: Option<ProgressTracker>,
}

impl StageJob {
    pub fn new(stage: TransferStage) -> Self {
        Self {
            stage,
            source: None,
            destination: None,
            transform: None,
            tracker: None,
        }
    }

    pub fn with_source(mut self, source: Option<BoxedReader>) -> Self {
        self.source = source;
        self
    }

    pub fn with_destination(mut self, destination: Option<BoxedWriter>) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_transform(mut self, transform: StageTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }
}

/// Runs stages against a progress record and an event bus.
pub struct StageRunner<'a> {
    progress: &'a mut TransferProgress,
    events: &'a EventBus,
}

impl<'a> StageRunner<'a> {
    pub fn new(progress: &'a mut TransferProgress, events: &'a EventBus) -> Self {
        Self { progress, events }
    }

    /// Runs `job` to completion.
    ///
    /// When either side is missing the stage is skipped: the side that is
    /// present gets closed and `stage::skip` is emitted. Otherwise the stage
    /// emits `stage::start`, pipes every record and emits `stage::finish`.
    pub async fn run(&mut self, job: StageJob) -> TransferResult<()> {
        let StageJob {
            stage,
            source,
            destination,
            transform,
            tracker,
        } = job;

        let (mut source, mut destination) = match (source, destination) {
            (Some(source), Some(destination)) => (source, destination),
            (source, destination) => {
                self.skip(stage, source, destination).await;
                return Ok(());
            }
        };

        info!("Starting {} stage", stage);
        self.events
            .emit_stage(stage, self.progress, |stage, data| TransferEvent::StageStart { stage, data });

        let piped = self
            .pipe(
                stage,
                source.as_mut(),
                destination.as_mut(),
                transform.as_ref(),
                tracker.as_ref(),
            )
            .await;

        if let Err(e) = piped {
            warn!("{} stage failed: {}", stage, e);
            destination.abort().await;
            if let Err(close_err) = source.close().await {
                debug!("Closing {} source after failure: {}", stage, close_err);
            }
            return Err(e);
        }

        self.events
            .emit_stage(stage, self.progress, |stage, data| TransferEvent::StageFinish { stage, data });
        info!(
            "Finished {} stage ({} records)",
            stage,
            self.progress.get(stage).map_or(0, |p| p.count)
        );
        Ok(())
    }

    async fn pipe(
        &mut self,
        stage: TransferStage,
        source: &mut dyn StageReader,
        destination: &mut dyn StageWriter,
        transform: Option<&StageTransform>,
        tracker: Option<&ProgressTracker>,
    ) -> TransferResult<()> {
        while let Some(next) = source.next().await {
            let mut record = next?;

            if let Some(transform) = transform {
                match transform.apply(record).await? {
                    Some(transformed) => record = transformed,
                    None => continue,
                }
            }

            if let Some(tracker) = tracker {
                tracker.track(&record, self.progress)?;
                self.events.emit_stage(stage, self.progress, |stage, data| {
                    TransferEvent::StageProgress { stage, data }
                });
            }

            destination.write(record).await?;
        }

        destination.close().await?;
        source.close().await?;
        Ok(())
    }

    async fn skip(
        &mut self,
        stage: TransferStage,
        source: Option<BoxedReader>,
        destination: Option<BoxedWriter>,
    ) {
        let close_source = async {
            match source {
                Some(mut source) if !source.is_closed() => source.close().await,
                _ => Ok(()),
            }
        };
        let close_destination = async {
            match destination {
                Some(mut destination) if !destination.is_closed() => destination.close().await,
                _ => Ok(()),
            }
        };

        let (source_closed, destination_closed) = tokio::join!(close_source, close_destination);
        if let Err(e) = source_closed {
            warn!("Closing unused {} source failed: {}", stage, e);
        }
        if let Err(e) = destination_closed {
            warn!("Closing unused {} destination failed: {}", stage, e);
        }

        info!("Skipping {} stage: not supported by both providers", stage);
        self.events
            .emit_stage(stage, self.progress, |stage, data| TransferEvent::StageSkip { stage, data });
    }
}

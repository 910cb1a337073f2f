//! Lifecycle and progress notifications.
//!
//! The engine broadcasts a fixed set of [`TransferEvent`]s to every
//! registered [`TransferObserver`]. Observers are called synchronously, in
//! registration order, so they see events in exactly the order the engine
//! produced them.

use crate::engine::EngineState;
use crate::progress::TransferProgress;
use datashift_types::TransferStage;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A notification emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A transfer was requested; progress has been reset.
    TransferInit,
    /// Integrity checks passed; stages are about to run.
    TransferStart,
    /// Every stage ran and both providers closed.
    TransferFinish,
    /// The transfer failed while the engine was in `state`.
    TransferError { message: String, state: EngineState },
    StageStart {
        stage: TransferStage,
        data: TransferProgress,
    },
    StageProgress {
        stage: TransferStage,
        data: TransferProgress,
    },
    StageFinish {
        stage: TransferStage,
        data: TransferProgress,
    },
    /// One side does not support the stage.
    StageSkip {
        stage: TransferStage,
        data: TransferProgress,
    },
}

impl TransferEvent {
    /// The event name, e.g. `stage::progress`.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TransferInit => "transfer::init",
            Self::TransferStart => "transfer::start",
            Self::TransferFinish => "transfer::finish",
            Self::TransferError { .. } => "transfer::error",
            Self::StageStart { .. } => "stage::start",
            Self::StageProgress { .. } => "stage::progress",
            Self::StageFinish { .. } => "stage::finish",
            Self::StageSkip { .. } => "stage::skip",
        }
    }

    /// The stage a `stage::*` event refers to.
    pub const fn stage(&self) -> Option<TransferStage> {
        match self {
            Self::StageStart { stage, .. }
            | Self::StageProgress { stage, .. }
            | Self::StageFinish { stage, .. }
            | Self::StageSkip { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The progress snapshot carried by `stage::*` events.
    pub const fn progress(&self) -> Option<&TransferProgress> {
        match self {
            Self::StageStart { data, .. }
            | Self::StageProgress { data, .. }
            | Self::StageFinish { data, .. }
            | Self::StageSkip { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage() {
            Some(stage) => write!(f, "{} ({stage})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// Receives engine notifications.
pub trait TransferObserver: Send + Sync {
    fn on_event(&self, event: &TransferEvent);
}

impl<F> TransferObserver for F
where
    F: Fn(&TransferEvent) + Send + Sync,
{
    fn on_event(&self, event: &TransferEvent) {
        self(event)
    }
}

/// Forwards events to an unbounded channel, for async consumers such as a
/// progress bar running on its own task.
///
/// Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TransferObserver for ChannelObserver {
    fn on_event(&self, event: &TransferEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// The set of observers attached to an engine.
#[derive(Clone, Default)]
pub struct EventBus {
    observers: Vec<Arc<dyn TransferObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn TransferObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn emit(&self, event: TransferEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    /// Emits a `stage::*` event built from the current progress.
    ///
    /// The snapshot is only cloned when someone is listening.
    pub fn emit_stage(
        &self,
        stage: TransferStage,
        progress: &TransferProgress,
        make: fn(TransferStage, TransferProgress) -> TransferEvent,
    ) {
        if self.observers.is_empty() {
            return;
        }
        self.emit(make(stage, progress.clone()));
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("observers", &self.observers.len())
            .finish()
    }
}

//! Stage transforms.
//!
//! Transforms are configured globally (applied to every stage) and per
//! stage. For a given stage they compose into a single [`StageTransform`]:
//! global transforms first, then the stage's own, each one feeding the next.

use crate::error::TransferResult;
use datashift_types::{Record, TransferStage};
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Predicate deciding whether a record continues down the stage.
pub type FilterFn = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Function replacing a record with a new one.
pub type MapFn = Arc<dyn Fn(Record) -> BoxFuture<'static, TransferResult<Record>> + Send + Sync>;

/// A single configured transform.
#[derive(Clone)]
pub enum Transform {
    /// Keeps the record iff the predicate returns `true`.
    Filter(FilterFn),
    /// Replaces the record with the function's output.
    Map(MapFn),
}

impl Transform {
    /// A filtering transform.
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self::Filter(Arc::new(predicate))
    }

    /// A synchronous, infallible mapping transform.
    pub fn map<F>(f: F) -> Self
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        Self::Map(map_fn(move |record| future::ready(Ok(f(record))).boxed()))
    }

    /// A synchronous mapping transform that may fail.
    pub fn try_map<F>(f: F) -> Self
    where
        F: Fn(Record) -> TransferResult<Record> + Send + Sync + 'static,
    {
        Self::Map(map_fn(move |record| future::ready(f(record)).boxed()))
    }

    /// An asynchronous mapping transform.
    pub fn map_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TransferResult<Record>> + Send + 'static,
    {
        Self::Map(map_fn(move |record| f(record).boxed()))
    }
}

fn map_fn<F>(f: F) -> MapFn
where
    F: Fn(Record) -> BoxFuture<'static, TransferResult<Record>> + Send + Sync + 'static,
{
    Arc::new(f)
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(_) => f.write_str("Transform::Filter"),
            Self::Map(_) => f.write_str("Transform::Map"),
        }
    }
}

/// Global and per-stage transform lists.
#[derive(Debug, Clone, Default)]
pub struct TransferTransforms {
    pub global: Vec<Transform>,
    pub stages: HashMap<TransferStage, Vec<Transform>>,
}

impl TransferTransforms {
    /// Transforms configured for `stage` only.
    pub fn for_stage(&self, stage: TransferStage) -> &[Transform] {
        self.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Composes the pipeline for `stage`.
    ///
    /// With `include_global`, the global transforms run before the stage's
    /// own. No configured transform yields an identity pipeline.
    pub fn build_stage_transform(&self, stage: TransferStage, include_global: bool) -> StageTransform {
        let mut steps = Vec::new();
        if include_global {
            steps.extend(self.global.iter().cloned());
        }
        steps.extend(self.for_stage(stage).iter().cloned());
        StageTransform { stage, steps }
    }
}

/// The composed transform pipeline of one stage.
#[derive(Debug, Clone)]
pub struct StageTransform {
    stage: TransferStage,
    steps: Vec<Transform>,
}

impl StageTransform {
    /// A pipeline that passes every record through untouched.
    pub fn identity(stage: TransferStage) -> Self {
        Self {
            stage,
            steps: Vec::new(),
        }
    }

    pub fn stage(&self) -> TransferStage {
        self.stage
    }

    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs `record` through every step in order.
    ///
    /// Returns `None` as soon as a filter rejects the record; later steps
    /// never see it.
    pub async fn apply(&self, mut record: Record) -> TransferResult<Option<Record>> {
        for step in &self.steps {
            match step {
                Transform::Filter(predicate) => {
                    if !predicate(&record) {
                        return Ok(None);
                    }
                }
                Transform::Map(map) => record = map(record).await?,
            }
        }
        Ok(Some(record))
    }
}

use async_trait::async_trait;
use datashift_engine::memory::{MemoryDestination, MemorySource};
use datashift_engine::{
    create_transfer_engine, BoxedReader, BoxedWriter, ChannelObserver, ChannelWriter,
    DestinationProvider, EngineState, IntegrityError, Provider, ProviderType, SchemaStrategy,
    SourceProvider, StreamReader, TransferEngine, TransferError, TransferEvent, TransferOptions,
    TransferResult, Transform, VersionStrategy,
};
use datashift_types::{
    Asset, AttributeDescriptor, Entity, LinkEndpoint, Link, ProviderMetadata, Record,
    SchemaDescriptor, SchemaMap, TransferStage,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn entities(types: &[&str]) -> Vec<Record> {
    types
        .iter()
        .enumerate()
        .map(|(id, t)| Entity::new(id as u64 + 1, *t).into())
        .collect()
}

fn link() -> Record {
    Link {
        kind: "relation.basic".into(),
        relation: "manyToOne".into(),
        left: LinkEndpoint {
            entity_type: "a".into(),
            reference: 1,
            field: "author".into(),
            pos: None,
        },
        right: LinkEndpoint {
            entity_type: "b".into(),
            reference: 2,
            field: "articles".into(),
            pos: None,
        },
    }
    .into()
}

fn source() -> MemorySource {
    MemorySource::new("memory-source").with_stage(TransferStage::Entities, entities(&["a", "b", "a"]))
}

fn destination() -> MemoryDestination {
    MemoryDestination::new("memory-destination")
}

type Recorded = Arc<Mutex<Vec<TransferEvent>>>;

fn subscribe<S: SourceProvider, D: DestinationProvider>(engine: &mut TransferEngine<S, D>) -> Recorded {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.subscribe(Arc::new(move |event: &TransferEvent| {
        sink.lock().unwrap().push(event.clone());
    }));
    events
}

fn event_log(events: &Recorded) -> Vec<String> {
    events.lock().unwrap().iter().map(ToString::to_string).collect()
}

fn article() -> SchemaDescriptor {
    SchemaDescriptor::new("api::article.article", "contentType")
        .with_attribute("title", AttributeDescriptor::new("string"))
}

fn schema_map(descriptors: impl IntoIterator<Item = SchemaDescriptor>) -> SchemaMap {
    descriptors.into_iter().map(|d| (d.uid.clone(), d)).collect()
}

// ── Test providers ───────────────────────────────────────────────

/// A source that logs every hook it receives.
#[derive(Default)]
struct HookSource {
    calls: Arc<Mutex<Vec<&'static str>>>,
    refuse_bootstrap: bool,
    refuse_before_transfer: bool,
    metadata: Option<ProviderMetadata>,
    schemas: Option<SchemaMap>,
}

impl HookSource {
    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Provider for HookSource {
    fn name(&self) -> &str {
        "hooks"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Source
    }

    async fn bootstrap(&mut self) -> TransferResult<()> {
        self.log("bootstrap");
        if self.refuse_bootstrap {
            return Err(TransferError::Provider("bootstrap refused".into()));
        }
        Ok(())
    }

    async fn close(&mut self) -> TransferResult<()> {
        self.log("close");
        Ok(())
    }

    async fn before_transfer(&mut self) -> TransferResult<()> {
        self.log("before_transfer");
        if self.refuse_before_transfer {
            return Err(TransferError::Provider("source is read-only".into()));
        }
        Ok(())
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        self.log("get_metadata");
        Ok(self.metadata.clone())
    }

    async fn get_schemas(&mut self) -> TransferResult<Option<SchemaMap>> {
        Ok(self.schemas.clone())
    }
}

#[async_trait]
impl SourceProvider for HookSource {
    async fn stream_entities(&mut self) -> TransferResult<Option<BoxedReader>> {
        self.log("stream_entities");
        Ok(Some(StreamReader::from_records(entities(&["a"])).boxed()))
    }
}

/// A destination whose bootstrap only completes after yielding once.
struct SlowDestination {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Provider for SlowDestination {
    fn name(&self) -> &str {
        "slow"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Destination
    }

    async fn bootstrap(&mut self) -> TransferResult<()> {
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push("destination bootstrapped");
        Ok(())
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        Ok(None)
    }
}

#[async_trait]
impl DestinationProvider for SlowDestination {
    async fn rollback(&mut self, _error: &TransferError) -> TransferResult<()> {
        self.calls.lock().unwrap().push("destination rolled back");
        Ok(())
    }
}

fn failed_state(events: &Recorded) -> Option<EngineState> {
    events.lock().unwrap().iter().find_map(|event| match event {
        TransferEvent::TransferError { state, .. } => Some(*state),
        _ => None,
    })
}

/// A source that claims to be a destination.
struct Impostor;

#[async_trait]
impl Provider for Impostor {
    fn name(&self) -> &str {
        "impostor"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Destination
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        Ok(None)
    }
}

impl SourceProvider for Impostor {}

/// A destination whose entity writer is disconnected and which cannot
/// roll back.
struct BrokenDestination;

#[async_trait]
impl Provider for BrokenDestination {
    fn name(&self) -> &str {
        "broken"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Destination
    }

    async fn get_metadata(&mut self) -> TransferResult<Option<ProviderMetadata>> {
        Ok(None)
    }
}

#[async_trait]
impl DestinationProvider for BrokenDestination {
    async fn rollback(&mut self, _error: &TransferError) -> TransferResult<()> {
        Err(TransferError::Provider("cannot undo".into()))
    }

    async fn entities_writer(&mut self) -> TransferResult<Option<BoxedWriter>> {
        let (writer, rx) = ChannelWriter::channel(1);
        drop(rx);
        Ok(Some(writer.boxed()))
    }
}

// ── Successful transfers ─────────────────────────────────────────

#[tokio::test]
async fn transfers_entities_with_progress() {
    init_tracing();
    let destination = destination();
    let store = destination.store();
    let mut engine = TransferEngine::new(source(), destination, TransferOptions::default()).unwrap();

    let results = engine.transfer().await.unwrap();

    let stage = results.engine.get(TransferStage::Entities).unwrap();
    assert_eq!(stage.count, 3);
    assert_eq!(stage.aggregate("a").unwrap().count, 2);
    assert_eq!(stage.aggregate("b").unwrap().count, 1);
    assert_eq!(store.records(TransferStage::Entities), entities(&["a", "b", "a"]));
    assert_eq!(results.source, Some(json!({ "served": { "entities": 3 } })));
    assert_eq!(results.destination, Some(json!({ "written": { "entities": 3 } })));
    assert_eq!(engine.state(), EngineState::Finished);
}

#[tokio::test]
async fn stages_run_in_order() {
    let mut engine = TransferEngine::new(source(), destination(), TransferOptions::default()).unwrap();
    let events = subscribe(&mut engine);

    engine.transfer().await.unwrap();

    assert_eq!(
        event_log(&events),
        vec![
            "transfer::init",
            "transfer::start",
            "stage::skip (schemas)",
            "stage::start (entities)",
            "stage::progress (entities)",
            "stage::progress (entities)",
            "stage::progress (entities)",
            "stage::finish (entities)",
            "stage::skip (links)",
            "stage::skip (assets)",
            "stage::skip (configuration)",
            "transfer::finish",
        ]
    );
}

#[tokio::test]
async fn unsupported_destination_stage_is_skipped() {
    let source = source().with_stage(TransferStage::Links, vec![link()]);
    let destination = destination().with_stages([TransferStage::Entities]);
    let store = destination.store();
    let mut engine = TransferEngine::new(source, destination, TransferOptions::default()).unwrap();
    let events = subscribe(&mut engine);

    let results = engine.transfer().await.unwrap();

    assert!(event_log(&events).contains(&"stage::skip (links)".to_string()));
    assert!(results.engine.get(TransferStage::Links).is_none());
    assert!(store.records(TransferStage::Links).is_empty());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn assets_are_keyed_by_extension() {
    let source = MemorySource::new("files").with_stage(
        TransferStage::Assets,
        vec![
            Asset::new("cover.png", "/uploads/cover.png", vec![0; 120]).into(),
            Asset::new("doc.pdf", "/uploads/doc.pdf", vec![0; 80]).into(),
        ],
    );
    let mut engine = create_transfer_engine(source, destination(), TransferOptions::default()).unwrap();

    let results = engine.transfer().await.unwrap();

    let assets = results.engine.get(TransferStage::Assets).unwrap();
    assert_eq!(assets.bytes, 200);
    assert_eq!(assets.aggregate(".png").unwrap().bytes, 120);
    assert_eq!(assets.aggregate(".pdf").unwrap().bytes, 80);
}

#[tokio::test]
async fn transforms_apply_per_stage() {
    let options = TransferOptions::default().with_stage_transform(
        TransferStage::Entities,
        Transform::filter(|r| r.as_entity().is_some_and(|e| e.entity_type == "a")),
    );
    let destination = destination();
    let store = destination.store();
    let mut engine = TransferEngine::new(source(), destination, options).unwrap();

    let results = engine.transfer().await.unwrap();

    assert_eq!(results.engine.get(TransferStage::Entities).unwrap().count, 2);
    assert_eq!(store.records(TransferStage::Entities).len(), 2);
}

#[tokio::test]
async fn progress_is_reset_between_transfers() {
    let mut engine = TransferEngine::new(source(), destination(), TransferOptions::default()).unwrap();

    let first = engine.transfer().await.unwrap();
    let second = engine.transfer().await.unwrap();

    assert_eq!(first.engine, second.engine);
    assert_ne!(first.transfer_id, second.transfer_id);
}

#[tokio::test]
async fn hooks_run_in_lifecycle_order() {
    let hooks = HookSource::default();
    let calls = hooks.calls.clone();
    let mut engine = TransferEngine::new(hooks, destination(), TransferOptions::default()).unwrap();

    engine.transfer().await.unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["bootstrap", "get_metadata", "before_transfer", "stream_entities", "close"]
    );
}

#[tokio::test]
async fn source_metadata_reaches_destination() {
    let metadata = ProviderMetadata::with_version("4.2.0");
    let source = source().with_metadata(metadata.clone());
    let mut engine = TransferEngine::new(source, destination(), TransferOptions::default()).unwrap();

    engine.transfer().await.unwrap();

    assert_eq!(engine.destination().source_metadata(), Some(&metadata));
}

#[tokio::test]
async fn channel_observer_receives_events() {
    let (observer, mut rx) = ChannelObserver::channel();
    let mut engine = TransferEngine::new(source(), destination(), TransferOptions::default()).unwrap();
    engine.subscribe(Arc::new(observer));

    engine.transfer().await.unwrap();

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    assert_eq!(received.first(), Some(&TransferEvent::TransferInit));
    assert_eq!(received.last(), Some(&TransferEvent::TransferFinish));
}

#[tokio::test]
async fn single_stage_can_run_on_its_own() {
    let destination = destination();
    let store = destination.store();
    let mut engine = TransferEngine::new(source(), destination, TransferOptions::default()).unwrap();

    engine.bootstrap().await.unwrap();
    engine.init().await.unwrap();
    engine.transfer_entities().await.unwrap();
    engine.close().await.unwrap();

    assert_eq!(store.records(TransferStage::Entities).len(), 3);
    assert_eq!(engine.progress().get(TransferStage::Entities).unwrap().count, 3);
}

// ── Construction ─────────────────────────────────────────────────

#[test]
fn wrong_provider_type_is_rejected() {
    let Err(err) = TransferEngine::new(Impostor, destination(), TransferOptions::default()) else {
        panic!("engine accepted a destination as source");
    };
    assert!(matches!(err, TransferError::Configuration(_)));
    assert_eq!(
        err.to_string(),
        "configuration error: source provider impostor does not have type 'source'"
    );
}

// ── Integrity ────────────────────────────────────────────────────

#[tokio::test]
async fn version_mismatch_stops_before_any_stage() {
    init_tracing();
    let source = source().with_metadata(ProviderMetadata::with_version("4.0.0"));
    let destination = destination().with_metadata(ProviderMetadata::with_version("5.0.0"));
    let store = destination.store();
    let options = TransferOptions::default().with_version_strategy(VersionStrategy::Major);
    let mut engine = TransferEngine::new(source, destination, options).unwrap();
    let events = subscribe(&mut engine);

    let err = engine.transfer().await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "unable to transfer the data between memory-source and memory-destination: \
         versions don't match (major check): 4.0.0 does not match with 5.0.0"
    );
    assert_eq!(event_log(&events), vec!["transfer::init", "transfer::error"]);
    assert!(store.is_empty());
    assert_eq!(engine.destination().rollbacks().len(), 1);
    assert_eq!(engine.state(), EngineState::Errored);
}

#[tokio::test]
async fn schema_mismatch_reports_differences() {
    let source = source().with_metadata(ProviderMetadata::default().with_schemas(schema_map([article()])));
    let changed = SchemaDescriptor::new("api::article.article", "contentType")
        .with_attribute("title", AttributeDescriptor::new("richtext"));
    let destination =
        destination().with_metadata(ProviderMetadata::default().with_schemas(schema_map([changed])));
    let mut engine = TransferEngine::new(source, destination, TransferOptions::default()).unwrap();

    let err = engine.transfer().await.unwrap_err();

    let TransferError::Integrity {
        source_name,
        destination_name,
        report: IntegrityError::SchemaMismatch { diffs },
    } = err
    else {
        panic!("expected a schema mismatch");
    };
    assert_eq!(source_name, "memory-source");
    assert_eq!(destination_name, "memory-destination");
    assert_eq!(diffs.len(), 1);
    assert!(diffs.contains_key("api::article.article"));
}

#[tokio::test]
async fn ignored_schemas_let_transfer_through() {
    let source = source().with_metadata(ProviderMetadata::default().with_schemas(schema_map([article()])));
    let destination = destination().with_metadata(ProviderMetadata::default().with_schemas(SchemaMap::new()));
    let options = TransferOptions::default().with_schema_strategy(SchemaStrategy::Ignore);
    let mut engine = TransferEngine::new(source, destination, options).unwrap();

    assert!(engine.transfer().await.is_ok());
}

#[tokio::test]
async fn fetched_schemas_take_precedence_over_metadata() {
    let hooks = HookSource {
        metadata: Some(ProviderMetadata::default().with_schemas(SchemaMap::new())),
        schemas: Some(schema_map([article()])),
        ..HookSource::default()
    };
    let destination = destination().with_metadata(ProviderMetadata::default().with_schemas(schema_map([article()])));
    let mut engine = TransferEngine::new(hooks, destination, TransferOptions::default()).unwrap();

    engine.init().await.unwrap();
    assert!(engine.integrity_check().await);
}

#[tokio::test]
async fn version_is_checked_from_provider_json() {
    let source_metadata: ProviderMetadata =
        serde_json::from_value(json!({ "strapi": { "version": "4.1.0" } })).unwrap();
    let destination_metadata: ProviderMetadata =
        serde_json::from_value(json!({ "strapi": { "version": "5.0.0" } })).unwrap();
    let source = source().with_metadata(source_metadata);
    let destination = destination().with_metadata(destination_metadata);
    let options = TransferOptions::default().with_version_strategy(VersionStrategy::Patch);
    let mut engine = TransferEngine::new(source, destination, options).unwrap();

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(
        err,
        TransferError::Integrity {
            report: IntegrityError::VersionMismatch { .. },
            ..
        }
    ));
    assert!(engine.progress().is_empty());
}

#[tokio::test]
async fn integrity_check_reports_false_on_mismatch() {
    let source = source().with_metadata(ProviderMetadata::with_version("4.1.0"));
    let destination = destination().with_metadata(ProviderMetadata::with_version("4.2.0"));
    let options = TransferOptions::default().with_version_strategy(VersionStrategy::Minor);
    let mut engine = TransferEngine::new(source, destination, options).unwrap();

    engine.init().await.unwrap();
    assert!(!engine.integrity_check().await);
}

// ── Failures and rollback ────────────────────────────────────────

#[tokio::test]
async fn failure_rolls_back_and_keeps_partial_progress() {
    let options = TransferOptions::default().with_stage_transform(
        TransferStage::Entities,
        Transform::try_map(|record| {
            if record.as_entity().is_some_and(|e| e.id == 3) {
                return Err(TransferError::Transform("entity 3 is corrupt".into()));
            }
            Ok(record)
        }),
    );
    let destination = destination();
    let store = destination.store();
    let mut engine = TransferEngine::new(source(), destination, options).unwrap();
    let events = subscribe(&mut engine);

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(err, TransferError::Transform(ref m) if m == "entity 3 is corrupt"));
    assert_eq!(engine.state(), EngineState::Errored);
    assert_eq!(
        engine.destination().rollbacks(),
        ["transform error: entity 3 is corrupt".to_string()]
    );
    assert!(store.is_empty());
    assert_eq!(engine.progress().get(TransferStage::Entities).unwrap().count, 2);

    let log = event_log(&events);
    assert_eq!(log.last().map(String::as_str), Some("transfer::error"));
    assert!(!log.contains(&"stage::finish (entities)".to_string()));
    assert!(!log.contains(&"transfer::finish".to_string()));
}

#[tokio::test]
async fn bootstrap_failure_is_rolled_back() {
    let hooks = HookSource {
        refuse_bootstrap: true,
        ..HookSource::default()
    };
    let calls = hooks.calls.clone();
    let mut engine = TransferEngine::new(hooks, destination(), TransferOptions::default()).unwrap();

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(err, TransferError::Provider(ref m) if m == "bootstrap refused"));
    assert_eq!(*calls.lock().unwrap(), vec!["bootstrap"]);
    assert_eq!(engine.destination().rollbacks().len(), 1);
}

#[tokio::test]
async fn failed_rollback_reports_both_errors() {
    let mut engine = TransferEngine::new(source(), BrokenDestination, TransferOptions::default()).unwrap();

    let err = engine.transfer().await.unwrap_err();

    let TransferError::Rollback { ref cause, ref rollback } = err else {
        panic!("expected a rollback error, got {err}");
    };
    assert!(matches!(**cause, TransferError::ChannelClosed));
    assert!(matches!(**rollback, TransferError::Provider(ref m) if m == "cannot undo"));
    assert!(matches!(err.root_cause(), TransferError::ChannelClosed));
}

#[tokio::test]
async fn write_failure_rolls_back_once_with_original_error() {
    let destination = destination().with_write_limit(2);
    let store = destination.store();
    let mut engine = TransferEngine::new(source(), destination, TransferOptions::default()).unwrap();
    let events = subscribe(&mut engine);

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(
        err,
        TransferError::Stream { stage: TransferStage::Entities, ref message }
            if message == "write limit of 2 records reached"
    ));
    assert_eq!(engine.destination().rollbacks(), [err.to_string()]);
    assert!(store.is_empty());
    assert_eq!(failed_state(&events), Some(EngineState::Stage(TransferStage::Entities)));
}

#[tokio::test]
async fn other_side_settles_when_bootstrap_fails() {
    let hooks = HookSource {
        refuse_bootstrap: true,
        ..HookSource::default()
    };
    let calls = hooks.calls.clone();
    let slow = SlowDestination {
        calls: calls.clone(),
    };
    let mut engine = TransferEngine::new(hooks, slow, TransferOptions::default()).unwrap();

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(err, TransferError::Provider(ref m) if m == "bootstrap refused"));
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["bootstrap", "destination bootstrapped", "destination rolled back"]
    );
}

#[tokio::test]
async fn before_transfer_failure_reports_its_state() {
    let hooks = HookSource {
        refuse_before_transfer: true,
        ..HookSource::default()
    };
    let mut engine = TransferEngine::new(hooks, destination(), TransferOptions::default()).unwrap();
    let events = subscribe(&mut engine);

    let err = engine.transfer().await.unwrap_err();

    assert!(matches!(err, TransferError::Provider(ref m) if m == "source is read-only"));
    assert_eq!(failed_state(&events), Some(EngineState::BeforeTransfer));
    assert!(!event_log(&events).iter().any(|e| e.starts_with("stage::")));
}

use datashift_types::{
    Asset, ConfigurationEntry, Entity, Link, LinkEndpoint, Record, SchemaDescriptor, TransferStage,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn endpoint(entity_type: &str, reference: u64) -> LinkEndpoint {
    LinkEndpoint {
        entity_type: entity_type.into(),
        reference,
        field: "author".into(),
        pos: None,
    }
}

#[test]
fn record_reports_its_stage() {
    let link = Link {
        kind: "relation.basic".into(),
        relation: "manyToOne".into(),
        left: endpoint("api::article.article", 1),
        right: endpoint("api::author.author", 7),
    };

    assert_eq!(Record::from(Entity::new(1, "a")).stage(), TransferStage::Entities);
    assert_eq!(Record::from(link).stage(), TransferStage::Links);
    assert_eq!(
        Record::from(SchemaDescriptor::new("api::a.a", "contentType")).stage(),
        TransferStage::Schemas
    );
    assert_eq!(
        Record::from(Asset::new("a.png", "/uploads/a.png", vec![1, 2])).stage(),
        TransferStage::Assets
    );
    assert_eq!(
        Record::from(ConfigurationEntry {
            kind: "webhook".into(),
            value: json!({"url": "https://example.com"}),
        })
        .stage(),
        TransferStage::Configuration
    );
}

#[test]
fn entity_serializes_without_wrapper() {
    let record = Record::from(Entity::new(1, "a"));
    let json = serde_json::to_string(&record).unwrap();
    assert_eq!(json, r#"{"id":1,"type":"a"}"#);
    assert_eq!(record.serialized_len().unwrap(), json.len() as u64);
}

#[test]
fn entity_data_is_serialized_when_present() {
    let entity = Entity::new(3, "api::tag.tag").with_data(json!({"name": "rust"}));
    let json = serde_json::to_value(&entity).unwrap();
    assert_eq!(json, json!({"id": 3, "type": "api::tag.tag", "data": {"name": "rust"}}));
}

#[test]
fn link_uses_wire_field_names() {
    let link = Link {
        kind: "relation.basic".into(),
        relation: "oneToOne".into(),
        left: endpoint("a", 1),
        right: LinkEndpoint {
            pos: Some(2.0),
            ..endpoint("b", 2)
        },
    };
    let json = serde_json::to_value(&link).unwrap();
    assert_eq!(json["left"]["ref"], json!(1));
    assert_eq!(json["left"]["type"], json!("a"));
    assert!(json["left"].get("pos").is_none());
    assert_eq!(json["right"]["pos"], json!(2.0));
}

#[test]
fn asset_contents_are_not_serialized() {
    let asset = Asset::new("photo.jpg", "/uploads/photo.jpg", vec![0; 1024]);
    assert_eq!(asset.stats.size, 1024);

    let json = serde_json::to_value(&asset).unwrap();
    assert!(json.get("data").is_none());
    assert_eq!(json["stats"]["size"], json!(1024));
}

#[test]
fn asset_extension() {
    let ext = |name: &str| Asset::new(name, name, Vec::new()).extension();
    assert_eq!(ext("photo.jpg"), ".jpg");
    assert_eq!(ext("archive.tar.gz"), ".gz");
    assert_eq!(ext("uploads/readme"), "");
    assert_eq!(ext(".env"), "");
    assert_eq!(ext("dir.v2/file"), "");
}

#[test]
fn accessors_match_variant() {
    let record = Record::from(Entity::new(1, "a"));
    assert!(record.as_entity().is_some());
    assert!(record.as_asset().is_none());
    assert!(record.as_schema().is_none());
}

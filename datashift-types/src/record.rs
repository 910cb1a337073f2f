//! Records moved by the transfer stages.
//!
//! Each stage carries its own record type. [`Record`] wraps all of them so
//! that transforms and progress tracking can be written once for every
//! stage. The engine never looks inside a record except to size it and to
//! compute an aggregate key.

use crate::{SchemaDescriptor, TransferStage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single content entry of a given type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Identifier of the entry within its type.
    pub id: u64,
    /// Content-type identifier (e.g. `api::article.article`).
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Attribute values, as JSON.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Entity {
    /// Creates an entity with no attribute data.
    pub fn new(id: u64, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            data: serde_json::Value::Null,
        }
    }

    /// Sets the attribute data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// One side of a [`Link`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    /// Content-type identifier of the linked entity.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Identifier of the linked entity.
    #[serde(rename = "ref")]
    pub reference: u64,
    /// Attribute holding the relation.
    pub field: String,
    /// Ordering position, when the relation is ordered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
}

/// A relation between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Relation storage kind (e.g. `relation.basic`, `relation.morph`).
    pub kind: String,
    /// Relation cardinality (e.g. `oneToMany`).
    pub relation: String,
    pub left: LinkEndpoint,
    pub right: LinkEndpoint,
}

/// File statistics of an [`Asset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStats {
    /// Size in bytes.
    pub size: u64,
}

/// A binary file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub filename: String,
    pub filepath: String,
    pub stats: AssetStats,
    /// File contents. Not part of the serialized form.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Asset {
    /// Creates an asset from its name and contents.
    pub fn new(filename: impl Into<String>, filepath: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            filepath: filepath.into(),
            stats: AssetStats {
                size: data.len() as u64,
            },
            data,
        }
    }

    /// Returns the file extension including the leading dot (`".png"`), or
    /// an empty string when the file name has none.
    ///
    /// Dot-files such as `.env` have no extension.
    #[must_use]
    pub fn extension(&self) -> String {
        let name = Path::new(&self.filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match name.rfind('.') {
            Some(0) | None => String::new(),
            Some(idx) => name[idx..].to_string(),
        }
    }
}

/// A configuration item (core store entry, webhook, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    /// Configuration kind (e.g. `core-store`, `webhook`).
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
}

/// Any record that can flow through a stage.
///
/// Serializes to the JSON form of the wrapped value, which is also what the
/// default progress size is measured on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Schema(SchemaDescriptor),
    Entity(Entity),
    Link(Link),
    Asset(Asset),
    Configuration(ConfigurationEntry),
}

impl Record {
    /// The stage this kind of record belongs to.
    #[must_use]
    pub const fn stage(&self) -> TransferStage {
        match self {
            Self::Schema(_) => TransferStage::Schemas,
            Self::Entity(_) => TransferStage::Entities,
            Self::Link(_) => TransferStage::Links,
            Self::Asset(_) => TransferStage::Assets,
            Self::Configuration(_) => TransferStage::Configuration,
        }
    }

    /// Byte length of the record's serialized JSON form.
    pub fn serialized_len(&self) -> crate::Result<u64> {
        Ok(serde_json::to_vec(self)?.len() as u64)
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&Asset> {
        match self {
            Self::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&SchemaDescriptor> {
        match self {
            Self::Schema(schema) => Some(schema),
            _ => None,
        }
    }
}

impl From<SchemaDescriptor> for Record {
    fn from(value: SchemaDescriptor) -> Self {
        Self::Schema(value)
    }
}

impl From<Entity> for Record {
    fn from(value: Entity) -> Self {
        Self::Entity(value)
    }
}

impl From<Link> for Record {
    fn from(value: Link) -> Self {
        Self::Link(value)
    }
}

impl From<Asset> for Record {
    fn from(value: Asset) -> Self {
        Self::Asset(value)
    }
}

impl From<ConfigurationEntry> for Record {
    fn from(value: ConfigurationEntry) -> Self {
        Self::Configuration(value)
    }
}

//! Provider metadata and schema descriptors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema descriptors keyed by content-type identifier.
pub type SchemaMap = BTreeMap<String, SchemaDescriptor>;

/// Information about the platform a provider reads from or writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Semantic version of the platform.
    pub version: String,
}

/// Metadata a provider reports about its side of the transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Serialized under the `strapi` key providers report it with.
    #[serde(rename = "strapi", default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schemas: Option<SchemaMap>,
}

impl ProviderMetadata {
    /// Metadata carrying only a platform version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            platform: Some(PlatformInfo {
                version: version.into(),
            }),
            schemas: None,
        }
    }

    /// Attaches schema descriptors.
    pub fn with_schemas(mut self, schemas: SchemaMap) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// The platform version, if reported.
    pub fn version(&self) -> Option<&str> {
        self.platform.as_ref().map(|p| p.version.as_str())
    }
}

/// One attribute of a content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Attribute type tag (`string`, `relation`, `media`, ...).
    #[serde(rename = "type")]
    pub attribute_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Any further attribute options (`required`, `private`, ...).
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl AttributeDescriptor {
    pub fn new(attribute_type: impl Into<String>) -> Self {
        Self {
            attribute_type: attribute_type.into(),
            relation: None,
            target: None,
            options: serde_json::Map::new(),
        }
    }

    /// Turns the attribute into a relation towards `target`.
    pub fn relation(relation: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            attribute_type: "relation".into(),
            relation: Some(relation.into()),
            target: Some(target.into()),
            options: serde_json::Map::new(),
        }
    }

    /// Sets an extra attribute option.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

/// Structural description of one content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Content-type identifier.
    pub uid: String,
    /// `contentType` or `component`.
    #[serde(rename = "modelType")]
    pub model_type: String,
    #[serde(rename = "modelName", default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeDescriptor>,
    /// Remaining descriptor fields (options, plugin options, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SchemaDescriptor {
    pub fn new(uid: impl Into<String>, model_type: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            model_type: model_type.into(),
            model_name: None,
            attributes: BTreeMap::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: AttributeDescriptor) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }
}

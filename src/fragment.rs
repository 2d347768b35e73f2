//! Graph fragments: the unit of input handed to the import engine.
//!
//! A fragment is an unordered bag of schema declarations, nodes and
//! relationships produced from one source document. Relationships refer to
//! their endpoints by [`Key`] only, so a fragment may point at nodes that live
//! in another fragment, possibly one that has not been imported yet.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GraphImportError,
    identity::{Index, Key},
    value::{Properties, PropertyValue},
};

pub const PROPERTY_SOURCE: &str = "source";
pub const PROPERTY_TYPE: &str = "type";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub key: Option<Key>,
    #[serde(default)]
    pub indexes: Vec<Key>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub broken: bool,
}

impl Node {
    pub fn new(key: Key) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Nodes flagged deleted or broken are never written to the store.
    pub fn is_suppressed(&self) -> bool {
        self.deleted || self.broken
    }

    /// The primary key followed by every additional index key.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.key.iter().chain(self.indexes.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub start: Key,
    pub end: Key,
    #[serde(default)]
    pub properties: Properties,
}

impl Relationship {
    pub fn new(rel_type: impl Into<String>, start: Key, end: Key) -> Self {
        Self {
            rel_type: rel_type.into(),
            start,
            end,
            properties: Properties::new(),
        }
    }

    /// Rejects a relationship that could never be written, whatever nodes
    /// later arrive for its keys.
    pub fn validate(&self) -> Result<(), GraphImportError> {
        if self.rel_type.trim().is_empty() {
            return Err(GraphImportError::invalid_input(format!(
                "relationship {} -> {} has no type",
                self.start, self.end
            )));
        }
        self.properties.values().try_for_each(PropertyValue::validate)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    pub index: Index,
    #[serde(default)]
    pub unique: bool,
}

impl SchemaDeclaration {
    pub fn index(index: Index) -> Self {
        Self {
            index,
            unique: false,
        }
    }

    pub fn unique(index: Index) -> Self {
        Self {
            index,
            unique: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub schemas: Vec<SchemaDeclaration>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty() && self.nodes.is_empty() && self.relationships.is_empty()
    }

    pub fn push_schema(&mut self, schema: SchemaDeclaration) {
        self.schemas.push(schema);
    }

    pub fn push_node(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn push_relationship(&mut self, relationship: Relationship) {
        self.relationships.push(relationship);
    }

    /// Appends every item of `other`, keeping input order.
    pub fn merge(&mut self, other: Graph) {
        self.schemas.extend(other.schemas);
        self.nodes.extend(other.nodes);
        self.relationships.extend(other.relationships);
    }
}

pub fn add_label(node: &mut Node, label: impl Into<String>) {
    node.labels.insert(label.into());
}

/// Registers an additional key. A node holds one value per index, so a key
/// whose index is already present replaces the earlier value.
pub fn add_index(node: &mut Node, key: Key) {
    match node.indexes.iter_mut().find(|k| k.index == key.index) {
        Some(existing) => *existing = key,
        None => node.indexes.push(key),
    }
}

pub fn set_property(
    properties: &mut Properties,
    name: impl Into<String>,
    value: impl Into<PropertyValue>,
) {
    properties.insert(name.into(), value.into());
}

/// Accumulates repeated values for `name` into a list.
pub fn add_property(
    properties: &mut Properties,
    name: impl Into<String>,
    value: impl Into<PropertyValue>,
) {
    let name = name.into();
    let value = value.into();
    let merged = match properties.remove(&name) {
        Some(existing) => existing.append(value),
        None => value,
    };
    properties.insert(name, merged);
}

pub fn set_node_source(node: &mut Node, source: impl Into<PropertyValue>) {
    set_property(&mut node.properties, PROPERTY_SOURCE, source);
}

pub fn add_node_source(node: &mut Node, source: impl Into<PropertyValue>) {
    add_property(&mut node.properties, PROPERTY_SOURCE, source);
}

pub fn set_node_type(node: &mut Node, node_type: impl Into<PropertyValue>) {
    set_property(&mut node.properties, PROPERTY_TYPE, node_type);
}

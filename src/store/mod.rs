//! Storage seam between the import engine and the backing property graph.
//!
//! [`GraphStore`] is the capability contract the engine relies on: node and
//! edge creation, multi-valued key lookup, idempotent index/constraint
//! creation, and all-or-nothing transactions with nested savepoints. The
//! engine never holds store entities across a transaction boundary, only the
//! opaque handles returned inside the active transaction.

mod schema;
mod sqlite;
mod transaction;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::GraphImportError,
    identity::{Index, Key},
    value::{Properties, PropertyValue},
};

pub use schema::ensure_schema;
pub use sqlite::{SqliteStore, StoreConfig, StoredRelationship};
pub use transaction::{SavepointGuard, TransactionGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipHandle(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Index,
    Unique,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Index => "index",
            SchemaKind::Unique => "unique",
        }
    }

    pub fn parse(value: &str) -> Result<Self, GraphImportError> {
        match value {
            "index" => Ok(SchemaKind::Index),
            "unique" => Ok(SchemaKind::Unique),
            other => Err(GraphImportError::schema(format!(
                "unknown schema kind {other}"
            ))),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an idempotent schema request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaOutcome {
    Created,
    Existing,
    /// A plain index was replaced by a uniqueness constraint.
    Upgraded,
}

pub trait GraphStore {
    fn begin(&self) -> Result<(), GraphImportError>;
    fn commit(&self) -> Result<(), GraphImportError>;
    fn rollback(&self) -> Result<(), GraphImportError>;
    fn savepoint(&self, name: &str) -> Result<(), GraphImportError>;
    fn release_savepoint(&self, name: &str) -> Result<(), GraphImportError>;
    /// Undoes everything since `savepoint(name)` and discards the savepoint.
    fn rollback_to_savepoint(&self, name: &str) -> Result<(), GraphImportError>;

    fn create_node(&self) -> Result<NodeHandle, GraphImportError>;
    fn add_label(&self, node: NodeHandle, label: &str) -> Result<(), GraphImportError>;
    fn set_node_property(
        &self,
        node: NodeHandle,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), GraphImportError>;
    /// Every node carrying `key.label` whose `key.property` equals `key.value`,
    /// ordered by handle.
    fn find_nodes(&self, key: &Key) -> Result<Vec<NodeHandle>, GraphImportError>;

    fn find_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<Option<RelationshipHandle>, GraphImportError>;
    fn create_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<RelationshipHandle, GraphImportError>;
    fn merge_relationship_properties(
        &self,
        relationship: RelationshipHandle,
        properties: &Properties,
    ) -> Result<(), GraphImportError>;

    fn ensure_index(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError>;
    fn ensure_unique_constraint(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError>;
}

impl<'a, S> GraphStore for &'a S
where
    S: GraphStore + ?Sized,
{
    fn begin(&self) -> Result<(), GraphImportError> {
        (*self).begin()
    }

    fn commit(&self) -> Result<(), GraphImportError> {
        (*self).commit()
    }

    fn rollback(&self) -> Result<(), GraphImportError> {
        (*self).rollback()
    }

    fn savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        (*self).savepoint(name)
    }

    fn release_savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        (*self).release_savepoint(name)
    }

    fn rollback_to_savepoint(&self, name: &str) -> Result<(), GraphImportError> {
        (*self).rollback_to_savepoint(name)
    }

    fn create_node(&self) -> Result<NodeHandle, GraphImportError> {
        (*self).create_node()
    }

    fn add_label(&self, node: NodeHandle, label: &str) -> Result<(), GraphImportError> {
        (*self).add_label(node, label)
    }

    fn set_node_property(
        &self,
        node: NodeHandle,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), GraphImportError> {
        (*self).set_node_property(node, name, value)
    }

    fn find_nodes(&self, key: &Key) -> Result<Vec<NodeHandle>, GraphImportError> {
        (*self).find_nodes(key)
    }

    fn find_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<Option<RelationshipHandle>, GraphImportError> {
        (*self).find_relationship(start, end, rel_type)
    }

    fn create_relationship(
        &self,
        start: NodeHandle,
        end: NodeHandle,
        rel_type: &str,
    ) -> Result<RelationshipHandle, GraphImportError> {
        (*self).create_relationship(start, end, rel_type)
    }

    fn merge_relationship_properties(
        &self,
        relationship: RelationshipHandle,
        properties: &Properties,
    ) -> Result<(), GraphImportError> {
        (*self).merge_relationship_properties(relationship, properties)
    }

    fn ensure_index(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError> {
        (*self).ensure_index(index)
    }

    fn ensure_unique_constraint(&self, index: &Index) -> Result<SchemaOutcome, GraphImportError> {
        (*self).ensure_unique_constraint(index)
    }
}

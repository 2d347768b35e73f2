//! Turns fragment nodes into store nodes.
//!
//! Each node is written inside its own savepoint. A node that fails is undone
//! completely, including relationships its keys released from the pending
//! index, and the fragment carries on with the next node.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    errors::GraphImportError,
    fragment::Node,
    pending::PendingRelationships,
    report::Counters,
    resolver::resolve,
    store::{GraphStore, NodeHandle, SavepointGuard},
    value::PropertyValue,
};

const NODE_SAVEPOINT: &str = "graph_node";

/// What to do with a fragment node whose primary key already matches a store node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum NodePolicy {
    /// Always create a new store node.
    #[default]
    CreateOnly,
    /// Write onto the first store node matching the primary key, creating one
    /// only when none exists.
    FindOrUpdate,
}

impl fmt::Display for NodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodePolicy::CreateOnly => f.write_str("create-only"),
            NodePolicy::FindOrUpdate => f.write_str("find-or-update"),
        }
    }
}

#[derive(Debug)]
pub enum Materialized {
    Created(NodeHandle),
    Updated(NodeHandle),
    /// The node is flagged deleted or broken.
    Skipped,
    /// The node was rejected and nothing it did was kept.
    Failed(GraphImportError),
}

impl Materialized {
    pub fn handle(&self) -> Option<NodeHandle> {
        match self {
            Materialized::Created(handle) | Materialized::Updated(handle) => Some(*handle),
            Materialized::Skipped | Materialized::Failed(_) => None,
        }
    }
}

/// Writes `node` and retries every relationship waiting on one of its keys.
///
/// Per-node problems come back as [`Materialized::Failed`]. An `Err` means the
/// savepoint machinery itself broke and the surrounding transaction is no
/// longer usable.
pub fn materialize<S: GraphStore + ?Sized>(
    store: &S,
    pending: &mut PendingRelationships,
    node: &Node,
    policy: NodePolicy,
    counters: &mut Counters,
) -> Result<Materialized, GraphImportError> {
    if node.is_suppressed() {
        debug!(
            key = ?node.key.as_ref().map(ToString::to_string),
            deleted = node.deleted,
            broken = node.broken,
            "skipping suppressed node"
        );
        return Ok(Materialized::Skipped);
    }

    let savepoint = SavepointGuard::open(store, NODE_SAVEPOINT)?;
    let checkpoint = pending.checkpoint();
    let mut staged = Counters::default();
    match write_node(store, pending, node, policy, &mut staged) {
        Ok(materialized) => {
            savepoint.release()?;
            *counters += staged;
            Ok(materialized)
        }
        Err(err) => {
            savepoint.rollback()?;
            pending.rollback_to(checkpoint);
            warn!(
                key = ?node.key.as_ref().map(ToString::to_string),
                error = %err,
                "node not imported"
            );
            Ok(Materialized::Failed(err))
        }
    }
}

fn write_node<S: GraphStore + ?Sized>(
    store: &S,
    pending: &mut PendingRelationships,
    node: &Node,
    policy: NodePolicy,
    staged: &mut Counters,
) -> Result<Materialized, GraphImportError> {
    let key = node
        .key
        .as_ref()
        .ok_or_else(|| GraphImportError::invalid_input("node has no primary key"))?;
    if key.label().trim().is_empty() || key.property().trim().is_empty() {
        return Err(GraphImportError::invalid_input(format!(
            "node key {key} needs a label and a property"
        )));
    }

    let existing = match policy {
        NodePolicy::CreateOnly => None,
        NodePolicy::FindOrUpdate => store.find_nodes(key)?.first().copied(),
    };
    let handle = match existing {
        Some(handle) => {
            debug!(%key, node = handle.0, "updating node");
            handle
        }
        None => {
            debug!(%key, "importing node");
            store.create_node()?
        }
    };

    for key in node.keys() {
        store.add_label(handle, key.label())?;
        store.set_node_property(handle, key.property(), &PropertyValue::from(&key.value))?;
        for relationship in pending.take(key) {
            resolve(store, pending, relationship, false, staged)?;
        }
    }
    for label in &node.labels {
        store.add_label(handle, label)?;
    }
    for (name, value) in &node.properties {
        store.set_node_property(handle, name, value)?;
    }

    if existing.is_some() {
        staged.nodes_updated += 1;
        Ok(Materialized::Updated(handle))
    } else {
        staged.nodes_created += 1;
        Ok(Materialized::Created(handle))
    }
}

use std::{
    fmt, fs,
    io::{BufWriter, Write},
    ops::AddAssign,
    path::Path,
};

use serde::Serialize;

use crate::{errors::GraphImportError, fragment::SchemaDeclaration, identity::Key};

pub const DEFAULT_REPORT_FILE: &str = "log_unknown_relations.txt";

/// Work done by one unit of import, folded into the running totals on commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub nodes_created: u64,
    pub nodes_updated: u64,
    pub relationships_created: u64,
    pub relationships_updated: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, other: Self) {
        self.nodes_created += other.nodes_created;
        self.nodes_updated += other.nodes_updated;
        self.relationships_created += other.relationships_created;
        self.relationships_updated += other.relationships_updated;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    pub nodes_created: u64,
    pub nodes_updated: u64,
    pub relationships_created: u64,
    pub relationships_updated: u64,
    pub pending_relationship_keys: usize,
}

impl ImportStatistics {
    pub fn new(totals: Counters, pending_relationship_keys: usize) -> Self {
        Self {
            nodes_created: totals.nodes_created,
            nodes_updated: totals.nodes_updated,
            relationships_created: totals.relationships_created,
            relationships_updated: totals.relationships_updated,
            pending_relationship_keys,
        }
    }
}

impl fmt::Display for ImportStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} nodes have been created.", self.nodes_created)?;
        writeln!(f, "{} nodes have been updated.", self.nodes_updated)?;
        writeln!(
            f,
            "{} relationships have been created.",
            self.relationships_created
        )?;
        writeln!(
            f,
            "{} relationships have been updated.",
            self.relationships_updated
        )?;
        write!(
            f,
            "{} relationship keys are unknown in this graph.",
            self.pending_relationship_keys
        )
    }
}

#[derive(Debug)]
pub struct NodeFailure {
    /// Position of the node in the fragment's node list.
    pub position: usize,
    pub key: Option<Key>,
    pub error: GraphImportError,
}

#[derive(Debug)]
pub struct SchemaFailure {
    pub declaration: SchemaDeclaration,
    pub error: GraphImportError,
}

/// Outcome of importing one fragment.
#[derive(Debug, Default)]
pub struct FragmentReport {
    pub counters: Counters,
    pub schemas_applied: usize,
    pub nodes_skipped: usize,
    pub node_failures: Vec<NodeFailure>,
    pub schema_failures: Vec<SchemaFailure>,
    /// Fragment relationships left waiting on at least one endpoint.
    pub relationships_deferred: usize,
    pub pending_relationship_keys: usize,
}

impl FragmentReport {
    pub fn has_failures(&self) -> bool {
        !self.node_failures.is_empty() || !self.schema_failures.is_empty()
    }
}

/// Writes one `label.property.value` line per key, sorted.
pub fn write_unresolved_keys<P: AsRef<Path>>(
    path: P,
    keys: &[Key],
) -> Result<(), GraphImportError> {
    let path = path.as_ref();
    let mut lines: Vec<String> = keys.iter().map(ToString::to_string).collect();
    lines.sort();
    let file = fs::File::create(path)
        .map_err(|e| GraphImportError::io(format!("{}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    for line in &lines {
        writeln!(writer, "{line}").map_err(|e| GraphImportError::io(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| GraphImportError::io(e.to_string()))
}

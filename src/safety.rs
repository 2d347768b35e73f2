//! Read-only integrity checks over an imported store.

use std::fmt;

use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{errors::GraphImportError, store::SqliteStore};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub total_nodes: i64,
    pub total_edges: i64,
    /// Edges whose start or end node row is gone.
    pub orphan_edges: i64,
    /// Extra edges sharing start, end and type with an earlier one.
    pub duplicate_edges: i64,
    pub dangling_labels: i64,
    pub dangling_properties: i64,
    /// Values shared by more than one node under a uniqueness constraint.
    pub unique_violations: i64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.total_nodes = self.total_nodes.max(other.total_nodes);
        self.total_edges = self.total_edges.max(other.total_edges);
        self.orphan_edges += other.orphan_edges;
        self.duplicate_edges += other.duplicate_edges;
        self.dangling_labels += other.dangling_labels;
        self.dangling_properties += other.dangling_properties;
        self.unique_violations += other.unique_violations;
    }

    pub fn has_issues(&self) -> bool {
        self.orphan_edges > 0
            || self.duplicate_edges > 0
            || self.dangling_labels > 0
            || self.dangling_properties > 0
            || self.unique_violations > 0
    }
}

impl fmt::Display for SafetyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: {}", self.total_nodes)?;
        writeln!(f, "edges: {}", self.total_edges)?;
        writeln!(f, "orphan edges: {}", self.orphan_edges)?;
        writeln!(f, "duplicate edges: {}", self.duplicate_edges)?;
        writeln!(f, "dangling labels: {}", self.dangling_labels)?;
        writeln!(f, "dangling properties: {}", self.dangling_properties)?;
        write!(f, "unique violations: {}", self.unique_violations)
    }
}

#[derive(Debug)]
pub struct SafetyError {
    pub report: SafetyReport,
    pub source: Option<GraphImportError>,
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(err) => write!(f, "integrity checks could not run: {err}"),
            None => write!(f, "integrity violations detected"),
        }
    }
}

impl std::error::Error for SafetyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

pub fn check_orphan_edges(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    let mut report = base_report(store)?;
    report.orphan_edges = count(
        store,
        "SELECT COUNT(*) FROM graph_edges e \
         LEFT JOIN graph_nodes src ON src.id = e.from_id \
         LEFT JOIN graph_nodes dst ON dst.id = e.to_id \
         WHERE src.id IS NULL OR dst.id IS NULL",
    )?;
    Ok(report)
}

pub fn check_duplicate_edges(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    let mut report = base_report(store)?;
    report.duplicate_edges = count(
        store,
        "SELECT COALESCE(SUM(cnt - 1), 0) FROM ( \
             SELECT COUNT(*) AS cnt FROM graph_edges \
             GROUP BY from_id, to_id, edge_type HAVING cnt > 1 \
         )",
    )?;
    Ok(report)
}

pub fn check_dangling_attributes(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    let mut report = base_report(store)?;
    report.dangling_labels = count(
        store,
        "SELECT COUNT(*) FROM graph_labels l \
         LEFT JOIN graph_nodes n ON n.id = l.node_id WHERE n.id IS NULL",
    )?;
    report.dangling_properties = count(
        store,
        "SELECT COUNT(*) FROM graph_properties p \
         LEFT JOIN graph_nodes n ON n.id = p.node_id WHERE n.id IS NULL",
    )?;
    Ok(report)
}

pub fn check_unique_constraints(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    let mut report = base_report(store)?;
    report.unique_violations = count(
        store,
        "SELECT COUNT(*) FROM ( \
             SELECT s.label, s.property, p.value FROM graph_schema s \
             JOIN graph_labels l ON l.label = s.label \
             JOIN graph_properties p ON p.node_id = l.node_id AND p.key = s.property \
             WHERE s.kind = 'unique' \
             GROUP BY s.label, s.property, p.value HAVING COUNT(*) > 1 \
         )",
    )?;
    Ok(report)
}

pub fn run_safety_checks(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    let mut report = SafetyReport::default();
    report.merge(&check_orphan_edges(store)?);
    report.merge(&check_duplicate_edges(store)?);
    report.merge(&check_dangling_attributes(store)?);
    report.merge(&check_unique_constraints(store)?);
    Ok(report)
}

pub fn run_strict_safety_checks(store: &SqliteStore) -> Result<SafetyReport, SafetyError> {
    let report = run_safety_checks(store).map_err(|err| SafetyError {
        report: SafetyReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        Err(SafetyError {
            report,
            source: None,
        })
    } else {
        Ok(report)
    }
}

fn base_report(store: &SqliteStore) -> Result<SafetyReport, GraphImportError> {
    Ok(SafetyReport {
        total_nodes: store.node_count()?,
        total_edges: store.relationship_count()?,
        ..SafetyReport::default()
    })
}

fn count(store: &SqliteStore, sql: &str) -> Result<i64, GraphImportError> {
    store
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| GraphImportError::query(e.to_string()))
}

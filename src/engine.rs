//! The import engine: owns the pending index, the imported-schema set and the
//! running counters for one store.
//!
//! A fragment is imported in two transactions. Schema declarations commit
//! first so the data transaction sees them; nodes then relationships follow in
//! a second transaction that either commits whole or leaves no trace, neither
//! in the store nor in the engine's own state.

use std::time::Instant;

use tracing::{debug, info};

use crate::{
    errors::GraphImportError,
    fragment::{Graph, Node, Relationship, SchemaDeclaration},
    identity::Key,
    materializer::{Materialized, NodePolicy, materialize},
    pending::PendingRelationships,
    registrar::ImportedSchemas,
    report::{Counters, FragmentReport, ImportStatistics, NodeFailure, SchemaFailure},
    resolver::{ResolveOutcome, resolve},
    store::{GraphStore, SchemaOutcome, TransactionGuard},
};

pub struct ImportEngine<S: GraphStore> {
    store: S,
    policy: NodePolicy,
    pending: PendingRelationships,
    schemas: ImportedSchemas,
    totals: Counters,
}

impl<S: GraphStore> ImportEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_policy(store, NodePolicy::default())
    }

    pub fn with_policy(store: S, policy: NodePolicy) -> Self {
        Self {
            store,
            policy,
            pending: PendingRelationships::new(),
            schemas: ImportedSchemas::new(),
            totals: Counters::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn policy(&self) -> NodePolicy {
        self.policy
    }

    pub fn pending(&self) -> &PendingRelationships {
        &self.pending
    }

    pub fn imported_schemas(&self) -> &ImportedSchemas {
        &self.schemas
    }

    pub fn statistics(&self) -> ImportStatistics {
        ImportStatistics::new(self.totals, self.pending.key_count())
    }

    /// Keys that still have relationships waiting on them, sorted.
    pub fn unresolved_keys(&self) -> Vec<Key> {
        self.pending.keys()
    }

    /// Zeroes the node and relationship counters. Pending relationships stay.
    pub fn reset_counters(&mut self) {
        self.totals = Counters::default();
    }

    /// Imports one fragment: schemas, then nodes, then relationships.
    ///
    /// Schema and node failures are isolated and listed in the report. Any
    /// other error rolls the data transaction back and is returned.
    pub fn import_graph(&mut self, graph: &Graph) -> Result<FragmentReport, GraphImportError> {
        let mut report = FragmentReport::default();

        let started = Instant::now();
        self.apply_schemas(&graph.schemas, &mut report)?;
        let schema_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        let policy = self.policy;
        let ((), counters) = self.in_data_transaction(|store, pending, staged| {
            materialize_nodes(store, pending, &graph.nodes, policy, staged, &mut report)?;
            resolve_relationships(store, pending, &graph.relationships, staged, &mut report)
        })?;
        let data_ms = started.elapsed().as_millis() as u64;

        report.counters = counters;
        report.pending_relationship_keys = self.pending.key_count();
        info!(
            schemas = graph.schemas.len(),
            nodes = graph.nodes.len(),
            relationships = graph.relationships.len(),
            schema_ms,
            data_ms,
            pending_keys = report.pending_relationship_keys,
            "fragment imported"
        );
        Ok(report)
    }

    pub fn import_schemas(
        &mut self,
        schemas: &[SchemaDeclaration],
    ) -> Result<FragmentReport, GraphImportError> {
        let mut report = FragmentReport::default();
        self.apply_schemas(schemas, &mut report)?;
        report.pending_relationship_keys = self.pending.key_count();
        Ok(report)
    }

    /// Applies a single declaration in its own transaction. `None` means it
    /// was already applied by this engine.
    pub fn import_schema(
        &mut self,
        declaration: &SchemaDeclaration,
    ) -> Result<Option<SchemaOutcome>, GraphImportError> {
        let tx = TransactionGuard::begin(&self.store)?;
        let outcome = self.schemas.apply(&self.store, declaration)?;
        if let Err(err) = tx.commit() {
            self.schemas.forget(declaration);
            return Err(err);
        }
        Ok(outcome)
    }

    pub fn import_nodes(&mut self, nodes: &[Node]) -> Result<FragmentReport, GraphImportError> {
        let mut report = FragmentReport::default();
        let policy = self.policy;
        let ((), counters) = self.in_data_transaction(|store, pending, staged| {
            materialize_nodes(store, pending, nodes, policy, staged, &mut report)
        })?;
        report.counters = counters;
        report.pending_relationship_keys = self.pending.key_count();
        Ok(report)
    }

    pub fn import_node(&mut self, node: &Node) -> Result<Materialized, GraphImportError> {
        let policy = self.policy;
        let (materialized, _) = self.in_data_transaction(|store, pending, staged| {
            materialize(store, pending, node, policy, staged)
        })?;
        Ok(materialized)
    }

    pub fn import_relationships(
        &mut self,
        relationships: &[Relationship],
    ) -> Result<FragmentReport, GraphImportError> {
        let mut report = FragmentReport::default();
        let ((), counters) = self.in_data_transaction(|store, pending, staged| {
            resolve_relationships(store, pending, relationships, staged, &mut report)
        })?;
        report.counters = counters;
        report.pending_relationship_keys = self.pending.key_count();
        Ok(report)
    }

    pub fn import_relationship(
        &mut self,
        relationship: &Relationship,
    ) -> Result<ResolveOutcome, GraphImportError> {
        let (outcome, _) = self.in_data_transaction(|store, pending, staged| {
            resolve(store, pending, relationship.clone(), true, staged)
        })?;
        Ok(outcome)
    }

    fn apply_schemas(
        &mut self,
        schemas: &[SchemaDeclaration],
        report: &mut FragmentReport,
    ) -> Result<(), GraphImportError> {
        if schemas.is_empty() {
            return Ok(());
        }
        let tx = TransactionGuard::begin(&self.store)?;
        let mut applied = Vec::new();
        for declaration in schemas {
            match self.schemas.apply(&self.store, declaration) {
                Ok(Some(_)) => applied.push(declaration),
                Ok(None) => {}
                Err(error) => report.schema_failures.push(SchemaFailure {
                    declaration: declaration.clone(),
                    error,
                }),
            }
        }
        if let Err(err) = tx.commit() {
            for declaration in applied {
                self.schemas.forget(declaration);
            }
            return Err(err);
        }
        report.schemas_applied += applied.len();
        debug!(
            applied = applied.len(),
            failed = report.schema_failures.len(),
            "schema transaction committed"
        );
        Ok(())
    }

    /// Runs `f` inside a data transaction. On commit the pending journal is
    /// cleared and the staged counters join the totals; on any error both the
    /// store and the pending index return to where they were.
    fn in_data_transaction<R, F>(&mut self, f: F) -> Result<(R, Counters), GraphImportError>
    where
        F: FnOnce(&S, &mut PendingRelationships, &mut Counters) -> Result<R, GraphImportError>,
    {
        let checkpoint = self.pending.checkpoint();
        let mut staged = Counters::default();
        let store = &self.store;
        let pending = &mut self.pending;
        let result = TransactionGuard::begin(store).and_then(|tx| {
            let value = f(store, pending, &mut staged)?;
            tx.commit()?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                self.pending.commit();
                self.totals += staged;
                Ok((value, staged))
            }
            Err(err) => {
                self.pending.rollback_to(checkpoint);
                Err(err)
            }
        }
    }
}

fn materialize_nodes<S: GraphStore + ?Sized>(
    store: &S,
    pending: &mut PendingRelationships,
    nodes: &[Node],
    policy: NodePolicy,
    staged: &mut Counters,
    report: &mut FragmentReport,
) -> Result<(), GraphImportError> {
    for (position, node) in nodes.iter().enumerate() {
        match materialize(store, pending, node, policy, staged)? {
            Materialized::Created(_) | Materialized::Updated(_) => {}
            Materialized::Skipped => report.nodes_skipped += 1,
            Materialized::Failed(error) => report.node_failures.push(NodeFailure {
                position,
                key: node.key.clone(),
                error,
            }),
        }
    }
    Ok(())
}

fn resolve_relationships<S: GraphStore + ?Sized>(
    store: &S,
    pending: &mut PendingRelationships,
    relationships: &[Relationship],
    staged: &mut Counters,
    report: &mut FragmentReport,
) -> Result<(), GraphImportError> {
    for relationship in relationships {
        if let ResolveOutcome::Deferred { .. } =
            resolve(store, pending, relationship.clone(), true, staged)?
        {
            report.relationships_deferred += 1;
        }
    }
    Ok(())
}

use ahash::AHashSet;
use tracing::{debug, warn};

use crate::{
    errors::GraphImportError,
    fragment::SchemaDeclaration,
    store::{GraphStore, SavepointGuard, SchemaOutcome},
};

const SCHEMA_SAVEPOINT: &str = "graph_schema_decl";

/// Declarations already applied by this engine instance.
#[derive(Debug, Default)]
pub struct ImportedSchemas {
    applied: AHashSet<SchemaDeclaration>,
}

impl ImportedSchemas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn contains(&self, declaration: &SchemaDeclaration) -> bool {
        self.applied.contains(declaration)
    }

    /// Drops a declaration whose transaction never committed.
    pub fn forget(&mut self, declaration: &SchemaDeclaration) {
        self.applied.remove(declaration);
    }

    /// Ensures the index or constraint behind `declaration` exists. Returns
    /// `None` when it was already applied earlier, which performs no store
    /// work at all.
    ///
    /// Must run inside an open transaction. A rejected declaration is rolled
    /// back on its own and is not remembered, so a later fragment retries it.
    pub fn apply<S: GraphStore + ?Sized>(
        &mut self,
        store: &S,
        declaration: &SchemaDeclaration,
    ) -> Result<Option<SchemaOutcome>, GraphImportError> {
        if self.applied.contains(declaration) {
            return Ok(None);
        }
        let savepoint = SavepointGuard::open(store, SCHEMA_SAVEPOINT)?;
        let outcome = if declaration.unique {
            debug!(index = %declaration.index, "creating unique constraint");
            store.ensure_unique_constraint(&declaration.index)
        } else {
            debug!(index = %declaration.index, "creating index");
            store.ensure_index(&declaration.index)
        };
        match outcome {
            Ok(outcome) => {
                savepoint.release()?;
                if outcome == SchemaOutcome::Existing {
                    debug!(index = %declaration.index, "schema entry already present");
                }
                self.applied.insert(declaration.clone());
                Ok(Some(outcome))
            }
            Err(err) => {
                savepoint.rollback()?;
                warn!(
                    index = %declaration.index,
                    unique = declaration.unique,
                    error = %err,
                    "schema declaration rejected"
                );
                Err(err)
            }
        }
    }
}

use tracing::warn;

use crate::errors::GraphImportError;

use super::GraphStore;

/// Store transaction that rolls back on drop unless committed.
pub struct TransactionGuard<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    finished: bool,
}

impl<'a, S: GraphStore + ?Sized> TransactionGuard<'a, S> {
    pub fn begin(store: &'a S) -> Result<Self, GraphImportError> {
        store.begin()?;
        Ok(Self {
            store,
            finished: false,
        })
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn commit(mut self) -> Result<(), GraphImportError> {
        self.store.commit()?;
        self.finished = true;
        Ok(())
    }

    /// Runs `f` and commits on success. An error leaves the rollback to `Drop`.
    pub fn execute<F, R>(self, f: F) -> Result<R, GraphImportError>
    where
        F: FnOnce(&'a S) -> Result<R, GraphImportError>,
    {
        let result = f(self.store)?;
        self.commit()?;
        Ok(result)
    }
}

impl<S: GraphStore + ?Sized> Drop for TransactionGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.store.rollback() {
                warn!(error = %err, "transaction rollback failed");
            }
        }
    }
}

/// Named savepoint inside an open transaction. Dropping it unreleased undoes
/// every write made since it was taken.
pub struct SavepointGuard<'a, S: GraphStore + ?Sized> {
    store: &'a S,
    name: &'static str,
    finished: bool,
}

impl<'a, S: GraphStore + ?Sized> SavepointGuard<'a, S> {
    pub fn open(store: &'a S, name: &'static str) -> Result<Self, GraphImportError> {
        store.savepoint(name)?;
        Ok(Self {
            store,
            name,
            finished: false,
        })
    }

    pub fn release(mut self) -> Result<(), GraphImportError> {
        self.store.release_savepoint(self.name)?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), GraphImportError> {
        self.finished = true;
        self.store.rollback_to_savepoint(self.name)
    }
}

impl<S: GraphStore + ?Sized> Drop for SavepointGuard<'_, S> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.store.rollback_to_savepoint(self.name) {
                warn!(savepoint = self.name, error = %err, "savepoint rollback failed");
            }
        }
    }
}

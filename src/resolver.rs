use tracing::debug;

use crate::{
    errors::GraphImportError, fragment::Relationship, pending::PendingRelationships,
    report::Counters, store::GraphStore,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Every start match was connected to every end match.
    Connected { created: u64, updated: u64 },
    /// At least one endpoint is missing; the relationship now waits on it.
    Deferred { start: bool, end: bool },
    /// An endpoint is missing and the relationship was not queued.
    Dropped,
}

/// Connects `relationship` across every pair of matching store nodes.
///
/// A malformed relationship is rejected before it can be queued. With `store_unknown` set, a missing endpoint key gets the relationship
/// queued under it. The retry path passes `false`: a relationship still
/// missing an endpoint there is already queued under that endpoint.
pub fn resolve<S: GraphStore + ?Sized>(
    store: &S,
    pending: &mut PendingRelationships,
    relationship: Relationship,
    store_unknown: bool,
    counters: &mut Counters,
) -> Result<ResolveOutcome, GraphImportError> {
    relationship.validate()?;
    let starts = store.find_nodes(&relationship.start)?;
    let ends = if relationship.end == relationship.start {
        starts.clone()
    } else {
        store.find_nodes(&relationship.end)?
    };

    if starts.is_empty() || ends.is_empty() {
        if starts.is_empty() {
            debug!(key = %relationship.start, "relationship start key does not exist");
        }
        if ends.is_empty() {
            debug!(key = %relationship.end, "relationship end key does not exist");
        }
        if !store_unknown {
            return Ok(ResolveOutcome::Dropped);
        }
        let start_missing = starts.is_empty();
        let end_missing = ends.is_empty() && relationship.end != relationship.start;
        match (start_missing, end_missing) {
            (true, true) => {
                pending.defer(relationship.start.clone(), relationship.clone());
                pending.defer(relationship.end.clone(), relationship);
            }
            (true, false) => pending.defer(relationship.start.clone(), relationship),
            (false, _) => pending.defer(relationship.end.clone(), relationship),
        }
        return Ok(ResolveOutcome::Deferred {
            start: starts.is_empty(),
            end: ends.is_empty(),
        });
    }

    debug!(
        start = %relationship.start,
        rel_type = %relationship.rel_type,
        end = %relationship.end,
        "importing relationship"
    );
    let mut created = 0;
    let mut updated = 0;
    for &start in &starts {
        for &end in &ends {
            let handle = match store.find_relationship(start, end, &relationship.rel_type)? {
                Some(existing) => {
                    updated += 1;
                    existing
                }
                None => {
                    created += 1;
                    store.create_relationship(start, end, &relationship.rel_type)?
                }
            };
            store.merge_relationship_properties(handle, &relationship.properties)?;
        }
    }
    counters.relationships_created += created;
    counters.relationships_updated += updated;
    Ok(ResolveOutcome::Connected { created, updated })
}

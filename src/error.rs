// Error classification for a sync run.
//
// Two tiers, decided by what an error would corrupt:
// - Structural: a required collection fetch or a scoped lookup failed, or a
//   Brand/Vehicle upsert failed. Continuing would silently produce an
//   incomplete hierarchy, so the run aborts and the error surfaces here.
// - Leaf: a characteristic fetch or a single modification upsert failed.
//   Those are logged, counted in the report, and the run continues - they
//   never become a `SyncError`.
//
// The engine returns the structural error to the caller instead of killing
// the process from inside the algorithm; the binary decides what to do.

use crate::ports::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Fetching a required collection from the source catalog failed.
    #[error("fetching {entity} from source catalog: {source}")]
    SourceFetch {
        entity: &'static str,
        #[source]
        source: StoreError,
    },

    /// A scoped lookup in the target catalog failed unexpectedly.
    /// "No matching record" is `Ok(None)` at the port and never lands here.
    #[error("looking up {entity} {name:?} in target catalog: {source}")]
    TargetLookup {
        entity: &'static str,
        name: String,
        #[source]
        source: StoreError,
    },

    /// Persisting a Brand or Vehicle failed. Modification upserts are leaf
    /// failures and are handled inside the engine instead.
    #[error("persisting {entity} {name:?}: {source}")]
    TargetPersist {
        entity: &'static str,
        name: String,
        #[source]
        source: StoreError,
    },
}

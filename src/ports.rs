// 🔌 Adapter Ports - the contracts the reconciliation engine consumes
//
// One narrow capability per entity kind instead of a single wide repository
// type. The engine only ever sees these traits; the concrete SQL adapters in
// `db` (or the in-memory fakes in tests) implement them.
//
// NotFound convention, applied uniformly: scoped lookups return
// `Ok(None)` for "no matching record" - an expected outcome, never an error.
// `Err(StoreError)` always means a real failure in the backing store.

use crate::entities::{source, target};

// ============================================================================
// STORE ERROR
// ============================================================================

/// A real failure in a backing store (connection, query, corrupt row).
///
/// "No matching record" is never represented as a `StoreError`; the ports
/// encode it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct StoreError(#[from] anyhow::Error);

impl StoreError {
    pub fn msg(msg: impl Into<String>) -> Self {
        StoreError(anyhow::anyhow!(msg.into()))
    }
}

// ============================================================================
// SOURCE CATALOG (read-only)
// ============================================================================

/// Read-only accessor over the upstream Mark → Model → Modification hierarchy.
///
/// The first three calls fetch required collections: any error from them is
/// structural and aborts the run. Only the characteristic lookup treats
/// absence (`Ok(None)`) as a normal, enrichment-optional outcome.
pub trait SourceCatalog {
    fn marks(&self) -> Result<Vec<source::Mark>, StoreError>;

    fn models_by_mark(&self, mark_id: i64) -> Result<Vec<source::Model>, StoreError>;

    fn modifications_by_model(
        &self,
        model_id: i64,
    ) -> Result<Vec<source::Modification>, StoreError>;

    fn characteristic(
        &self,
        modification_id: i64,
    ) -> Result<Option<source::Characteristic>, StoreError>;
}

// ============================================================================
// TARGET CATALOG (scoped find + upsert, one port per level)
// ============================================================================

/// Brand lookup and persistence.
pub trait BrandStore {
    fn find_brand_by_name(&self, name: &str) -> Result<Option<target::Brand>, StoreError>;

    /// Persist a brand; the returned record always carries a non-zero id.
    fn upsert_brand(&self, brand: &target::Brand) -> Result<target::Brand, StoreError>;
}

/// Vehicle lookup and persistence.
///
/// Lookup is scoped to a brand: matching a vehicle across the whole catalog
/// by name alone is never performed, to avoid cross-brand collisions.
pub trait VehicleStore {
    fn find_vehicle(
        &self,
        brand_id: i64,
        name: &str,
    ) -> Result<Option<target::Vehicle>, StoreError>;

    fn upsert_vehicle(&self, vehicle: &target::Vehicle) -> Result<target::Vehicle, StoreError>;
}

/// Modification lookup and persistence, scoped to a vehicle.
pub trait ModificationStore {
    fn find_modification(
        &self,
        vehicle_id: i64,
        name: &str,
    ) -> Result<Option<target::Modification>, StoreError>;

    fn upsert_modification(
        &self,
        modification: &target::Modification,
    ) -> Result<target::Modification, StoreError>;
}

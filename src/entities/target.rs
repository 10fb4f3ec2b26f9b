// 🎯 Target Catalog Entities - Brand → Vehicle → Modification
//
// These are the mutable records the business serves. A freshly constructed
// draft carries the UNASSIGNED_ID sentinel; the id becomes non-zero only once
// the target store's upsert has persisted the record. Children are never
// constructed against a parent that still carries the sentinel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::entities::source;

/// Sentinel id for an entity the target store has not assigned yet.
///
/// A draft with this id is an in-memory candidate only: it cannot be used as
/// a foreign key, and the engine's descent gate refuses to walk below it.
pub const UNASSIGNED_ID: i64 = 0;

// ============================================================================
// BRAND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: i64,
    pub name: String,
    /// Linkage back to the source Mark this brand was matched/created from
    pub auto_link_id: Option<i64>,
    /// Third-party taxonomy reference; drafts carry an explicit zero
    pub third_party_id: Option<i64>,
}

impl Brand {
    /// Build an in-memory draft for a source mark with no target counterpart.
    pub fn draft(name: String, source_mark_id: i64) -> Self {
        Brand {
            id: UNASSIGNED_ID,
            name,
            auto_link_id: Some(source_mark_id),
            third_party_id: Some(0),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

// ============================================================================
// VEHICLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub brand_id: i64,
    pub name: String,
    pub auto_link_id: Option<i64>,
    pub third_party_id: Option<i64>,
    pub year_from: Option<NaiveDate>,
    pub year_to: Option<NaiveDate>,
}

impl Vehicle {
    /// Build a draft vehicle under an already-persisted brand.
    ///
    /// Year bounds are resolved independently: a present source YearFrom
    /// becomes January 1 of that year, a present YearTo becomes December 31.
    /// An absent bound stays absent - never defaulted or guessed.
    pub fn draft(brand_id: i64, name: String, model: &source::Model) -> Self {
        debug_assert_ne!(brand_id, UNASSIGNED_ID);

        Vehicle {
            id: UNASSIGNED_ID,
            brand_id,
            name,
            auto_link_id: Some(model.id),
            third_party_id: Some(0),
            year_from: model.year_from.and_then(year_span_start),
            year_to: model.year_to.and_then(year_span_end),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

// ============================================================================
// MODIFICATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: i64,
    pub vehicle_id: i64,
    pub brand_id: i64,
    pub name: String,
    /// Copied from the source series label
    pub construction_type: String,
    pub fuel_type: String,
    pub impulsion_type: String,
    pub horse_power: i64,
    pub cylinder_capacity: i64,
    pub year_from: Option<NaiveDate>,
    pub year_to: Option<NaiveDate>,
    pub auto_link_id: Option<i64>,
    pub third_party_id: Option<i64>,
}

impl Modification {
    /// Build a draft modification under an already-persisted vehicle.
    ///
    /// Year bounds use the source modification's two-tier resolution (own
    /// production year first, generation bound as fallback). Characteristic
    /// enrichment is applied separately and only on drafts.
    pub fn draft(
        vehicle_id: i64,
        brand_id: i64,
        name: String,
        modification: &source::Modification,
    ) -> Self {
        debug_assert_ne!(vehicle_id, UNASSIGNED_ID);
        debug_assert_ne!(brand_id, UNASSIGNED_ID);

        Modification {
            id: UNASSIGNED_ID,
            vehicle_id,
            brand_id,
            name,
            construction_type: modification.serie_name.clone(),
            fuel_type: String::new(),
            impulsion_type: String::new(),
            horse_power: 0,
            cylinder_capacity: 0,
            year_from: modification.resolved_year_from().and_then(year_span_start),
            year_to: modification.resolved_year_to().and_then(year_span_end),
            auto_link_id: Some(modification.id),
            third_party_id: Some(0),
        }
    }

    /// Apply characteristic enrichment to a draft.
    ///
    /// Never called on a matched modification: a sync run must not overwrite
    /// characteristics the target catalog already owns.
    pub fn apply_characteristic(&mut self, characteristic: &source::Characteristic) {
        self.fuel_type = characteristic.fuel_type.clone();
        self.impulsion_type = characteristic.impulsion_type.clone();
        self.horse_power = characteristic.horse_power;
        self.cylinder_capacity = characteristic.cylinder_capacity;
    }

    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}

// ============================================================================
// YEAR SPAN HELPERS
// ============================================================================

/// January 1 of the given year, or None for a year chrono cannot represent.
pub fn year_span_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// December 31 of the given year.
pub fn year_span_end(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
}

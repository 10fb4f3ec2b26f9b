// 🚗 Source Catalog Entities - read-only hierarchy from the upstream system
//
// Three levels: Mark → Model → Modification, plus a per-modification
// Characteristic lookup for enrichment. These records are immutable for the
// duration of a sync run; the engine never writes back to the source catalog.

use serde::{Deserialize, Serialize};

// ============================================================================
// MARK (top of hierarchy)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub id: i64,
    pub name: String,
    /// Localized (Cyrillic) display name, when the source carries one
    pub name_ru: Option<String>,
    /// Source-side taxonomy type (passenger car, truck, ...)
    pub car_type_id: i64,
}

// ============================================================================
// MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: i64,
    pub mark_id: i64,
    pub name: String,
    /// Aggregate production-year bounds; either bound can be absent
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
}

// ============================================================================
// MODIFICATION (leaf)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub id: i64,
    pub model_id: i64,
    pub name: String,
    /// Series label, copied verbatim into the target construction type
    pub serie_name: String,
    pub start_production_year: Option<i32>,
    pub end_production_year: Option<i32>,
    pub generation: Generation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub year_begin: Option<i32>,
    pub year_end: Option<i32>,
}

impl Modification {
    /// Start-of-production year with generation fallback.
    ///
    /// The modification's own production year wins; only when it is absent
    /// does the containing generation's bound apply. Each bound is resolved
    /// independently of the other.
    pub fn resolved_year_from(&self) -> Option<i32> {
        self.start_production_year.or(self.generation.year_begin)
    }

    /// End-of-production year with generation fallback.
    pub fn resolved_year_to(&self) -> Option<i32> {
        self.end_production_year.or(self.generation.year_end)
    }
}

// ============================================================================
// CHARACTERISTIC (enrichment, may be absent)
// ============================================================================

/// Enrichment data keyed by source Modification id.
///
/// Absence is a normal outcome: not every modification has characteristic
/// rows upstream, and a missing characteristic never blocks the sync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Characteristic {
    pub fuel_type: String,
    pub impulsion_type: String,
    pub horse_power: i64,
    pub cylinder_capacity: i64,
}

// 📊 Sync Report - structured accounting for a reconciliation run
//
// The engine returns one of these per run so callers (and dry-run operators)
// can see exactly what a run did - or, with every commit switch off, what it
// would have done.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// PER-LEVEL STATS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Source nodes visited at this level
    pub scanned: usize,
    /// Resolved against an existing target entity
    pub matched: usize,
    /// No target counterpart - a new draft was constructed
    pub drafted: usize,
    /// Upserted into the target store (commit switch was on)
    pub persisted: usize,
    /// Subtrees not descended into because the node stayed a draft.
    /// Always zero at the modification level - leaves have no subtree.
    pub skipped_subtrees: usize,
    /// Leaf failures logged and skipped at this level
    pub failed: usize,
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub brands: LevelStats,
    pub vehicles: LevelStats,
    pub modifications: LevelStats,
    /// Characteristic lookups that failed; enrichment was skipped for those
    pub enrichment_failures: usize,
    /// True when the run was aborted by the cancellation flag
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new() -> Self {
        SyncReport {
            brands: LevelStats::default(),
            vehicles: LevelStats::default(),
            modifications: LevelStats::default(),
            enrichment_failures: 0,
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        format!(
            "brands {}/{}/{} | vehicles {}/{}/{} | modifications {}/{}/{} (matched/drafted/persisted){}",
            self.brands.matched,
            self.brands.drafted,
            self.brands.persisted,
            self.vehicles.matched,
            self.vehicles.drafted,
            self.vehicles.persisted,
            self.modifications.matched,
            self.modifications.drafted,
            self.modifications.persisted,
            if self.cancelled { " [cancelled]" } else { "" },
        )
    }
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

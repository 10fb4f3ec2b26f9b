// Auto Catalog Sync - Core Library
//
// Reconciles a read-only source car catalog (Mark → Model → Modification)
// into the business-owned target catalog (Brand → Vehicle → Modification):
// normalize the source name, match scoped to the resolved parent, link or
// draft, persist per commit switch, and descend only below persisted nodes.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod normalizer;
pub mod ports;
pub mod report;
pub mod sync;

// Re-export commonly used types
pub use config::Config;
pub use db::{setup_source_database, setup_target_database, SourceDb, TargetDb};
pub use entities::target::UNASSIGNED_ID;
pub use error::SyncError;
pub use normalizer::{transliterate, NameNormalizer};
pub use ports::{BrandStore, ModificationStore, SourceCatalog, StoreError, VehicleStore};
pub use report::{LevelStats, SyncReport};
pub use sync::{CancelFlag, SyncEngine, SyncSwitches};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

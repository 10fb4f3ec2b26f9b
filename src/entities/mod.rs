// Entity Models - the two independently-owned catalogs
//
// `source` is the read-only upstream hierarchy (Mark → Model → Modification),
// `target` is the catalog the business serves (Brand → Vehicle → Modification).
// The two sides deliberately keep their own names for the same level; only
// the reconciliation engine maps between them.

pub mod source;
pub mod target;

pub use source::{Characteristic, Generation, Mark, Model};
pub use target::{Brand, Vehicle, UNASSIGNED_ID};

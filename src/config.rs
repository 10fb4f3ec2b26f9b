// Process configuration.
//
// Every option doubles as an environment variable so the binary can run under
// an operator shell or a scheduler with equal ease. All three commit switches
// default to off: the default invocation is a dry run that reports what a
// real run would change without writing anything.

use clap::Parser;
use std::path::PathBuf;

use crate::sync::SyncSwitches;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "auto-catalog-sync",
    about = "Reconcile the upstream car catalog into the business catalog",
    version
)]
pub struct Config {
    /// SQLite file holding the read-only source catalog
    #[arg(long, env = "SOURCE_DB_PATH", default_value = "auto.db")]
    pub source_db: PathBuf,

    /// SQLite file holding the target catalog (created if missing)
    #[arg(long, env = "TARGET_DB_PATH", default_value = "catalog.db")]
    pub target_db: PathBuf,

    /// Persist new/linked brands
    #[arg(long, env = "COMMIT_BRANDS", default_value_t = false)]
    pub commit_brands: bool,

    /// Persist new/linked vehicles
    #[arg(long, env = "COMMIT_VEHICLES", default_value_t = false)]
    pub commit_vehicles: bool,

    /// Persist new/linked modifications
    #[arg(long, env = "COMMIT_MODIFICATIONS", default_value_t = false)]
    pub commit_modifications: bool,

    /// Print the run report as JSON instead of the one-line summary
    #[arg(long, default_value_t = false)]
    pub json_report: bool,
}

impl Config {
    pub fn switches(&self) -> SyncSwitches {
        SyncSwitches {
            commit_brands: self.commit_brands,
            commit_vehicles: self.commit_vehicles,
            commit_modifications: self.commit_modifications,
        }
    }
}

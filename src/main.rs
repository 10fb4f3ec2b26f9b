use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use auto_catalog_sync::{
    CancelFlag, Config, NameNormalizer, SourceDb, SyncEngine, TargetDb,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    info!(
        source_db = %config.source_db.display(),
        target_db = %config.target_db.display(),
        "auto-catalog-sync v{}",
        auto_catalog_sync::VERSION
    );

    let source = SourceDb::open(&config.source_db)?;
    let target = TargetDb::open(&config.target_db)?;

    let engine = SyncEngine::new(
        &source,
        &target,
        &target,
        &target,
        NameNormalizer::with_defaults(),
        config.switches(),
    );

    // Single batch run per process lifetime. Cancellation is wired for
    // embedders; the CLI runs to completion.
    let report = engine.run(&CancelFlag::new())?;

    if config.json_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
    }

    Ok(())
}

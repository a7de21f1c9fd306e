//! Startup sequence: open, configure, upgrade, hand out the handle.

use tracing::info;

use assist_core::{DatabaseConfig, Migration, Result, UpgradeReport};

use crate::connection::{ConnectionProvider, DbHandle};
use crate::durability;
use crate::migrations::MIGRATIONS;
use crate::runner;

/// A connection whose schema matches the latest catalog version.
#[derive(Debug, Clone)]
pub struct Initialized {
    pub handle: DbHandle,
    pub report: UpgradeReport,
}

/// Run the startup sequence against the shipped catalog.
pub fn initialize(provider: &ConnectionProvider, config: &DatabaseConfig) -> Result<Initialized> {
    initialize_with_catalog(provider, config, MIGRATIONS)
}

/// Run the startup sequence against `catalog`.
///
/// Each step starts only after the previous one succeeded. The handle is
/// returned only when every pending migration has been committed.
pub fn initialize_with_catalog(
    provider: &ConnectionProvider,
    config: &DatabaseConfig,
    catalog: &[Migration],
) -> Result<Initialized> {
    let handle = provider.open(&config.path)?;
    durability::configure(&handle, &config.durability)?;
    let report = runner::upgrade(&handle, catalog)?;

    info!(
        "Database ready at {:?}, schema version {}",
        handle.path(),
        report.to
    );

    Ok(Initialized { handle, report })
}

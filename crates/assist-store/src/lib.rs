//! assist-store - SQLite storage layer with versioned schema migrations
//!
//! Opens the single process-wide connection, applies the durability
//! settings, and brings the schema up to the latest catalog version, one
//! transaction per migration.

pub mod connection;
pub mod durability;
pub mod migrations;
pub mod runner;
pub mod startup;
pub mod version;

pub use connection::{ConnectionProvider, DbHandle};
pub use migrations::{latest_version, validate_catalog, MIGRATIONS};
pub use runner::upgrade;
pub use startup::{initialize, initialize_with_catalog, Initialized};
pub use version::{applied_versions, current_version};

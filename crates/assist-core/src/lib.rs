//! assist-core - Core types, errors and configuration
//!
//! This crate provides the schema types, the error taxonomy and the
//! configuration used by the industrial-assist storage layer.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::{AssistError, Result};
pub use types::*;

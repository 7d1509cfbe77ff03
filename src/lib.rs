//! Legacy-style database facade over an async, pooled `SQLite` backend.
//!
//! Callers chain clause calls on a [`LegacyDb`]; terminal calls replay them in a
//! fixed phase order onto a table-bound [`builder::TableBuilder`], execute or
//! compile the statement, then reset. Transaction control, raw queries,
//! escaping, an upload helper and a few global helpers round out the surface.

pub mod builder;
pub mod common;
pub mod error;
pub mod escape;
pub mod executor;
pub mod legacy;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod sqlite;
pub mod types;
pub mod upload;

pub use error::BridgeError;
pub use executor::AsyncDatabaseExecutor;
pub use legacy::{LegacyDb, QueryOutcome};
pub use pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection};
pub use results::{CustomDbRow, DbResult, ResultSet};
pub use types::{DatabaseType, RowMap, RowValues};

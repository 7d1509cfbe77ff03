//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::error::BridgeError;
pub use crate::executor::AsyncDatabaseExecutor;
pub use crate::legacy::{LegacyDb, QueryOutcome};
pub use crate::pool::{ConfigAndPool, MiddlewarePool, MiddlewarePoolConnection};
pub use crate::results::{CustomDbRow, DbResult, ResultSet};
pub use crate::sqlite::{SqliteConnection, SqliteOptions, SqliteOptionsBuilder};
pub use crate::types::{DatabaseType, RowMap, RowValues};
pub use crate::upload::{FileBag, Upload, UploadData, UploadRequest, UploadedFile};

pub use crate::common::{html_escape, show_404, show_error};
pub use crate::escape::{escape, escape_str, remove_invisible_characters};

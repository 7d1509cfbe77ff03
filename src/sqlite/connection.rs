use std::fmt;
use std::sync::Arc;

use crate::error::BridgeError;
use crate::results::ResultSet;
use crate::types::RowValues;

use super::config::{SharedSqliteConnection, SqlitePooledConnection};
use super::params::Params;
use super::query::build_result_set;

/// Connection wrapper backed by a bb8 pooled `SQLite` connection.
///
/// Every call hops onto a blocking worker thread; calls on one wrapper run in
/// order because they share the same locked `rusqlite::Connection`.
pub struct SqliteConnection {
    pub(crate) conn: SqlitePooledConnection,
}

impl SqliteConnection {
    pub(crate) fn new(conn: SqlitePooledConnection) -> Self {
        Self { conn }
    }

    pub(crate) fn conn_handle(&self) -> SharedSqliteConnection {
        Arc::clone(&*self.conn)
    }

    /// Execute a batch of statements without parameters.
    ///
    /// # Errors
    /// Returns `BridgeError` if any statement fails.
    pub async fn execute_batch(&mut self, query: &str) -> Result<(), BridgeError> {
        let sql_owned = query.to_owned();
        run_blocking(self.conn_handle(), move |guard| {
            guard
                .execute_batch(&sql_owned)
                .map_err(BridgeError::SqliteError)
        })
        .await
    }

    /// Execute a SELECT and materialize into a `ResultSet`.
    ///
    /// # Errors
    /// Returns `BridgeError` if preparing or executing the query fails.
    pub async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, BridgeError> {
        let converted = Params::convert(params);
        let sql_owned = query.to_owned();
        run_blocking(self.conn_handle(), move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            build_result_set(&mut stmt, converted.as_values())
        })
        .await
    }

    /// Execute a DML statement and return the number of affected rows.
    ///
    /// # Errors
    /// Returns `BridgeError` if preparing or executing the statement fails.
    pub async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, BridgeError> {
        let converted = Params::convert(params);
        let sql_owned = query.to_owned();
        run_blocking(self.conn_handle(), move |guard| {
            let mut stmt = guard.prepare(&sql_owned)?;
            let rows = stmt.execute(rusqlite::params_from_iter(converted.as_values()))?;
            Ok(rows)
        })
        .await
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection").finish_non_exhaustive()
    }
}

pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, BridgeError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, BridgeError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await
    .map_err(|e| BridgeError::ExecutionError(format!("sqlite spawn_blocking join error: {e}")))?
}

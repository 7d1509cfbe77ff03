//! The legacy database facade: a deferred-clause query builder, raw queries,
//! escaping and transaction control over one checked-out connection.

mod binds;
mod clause;
mod driver;
mod query_builder;
mod state;
mod transaction;

pub use driver::{QueryOutcome, is_write_type};

use tracing::{debug, warn};

use crate::builder::CompiledQuery;
use crate::error::BridgeError;
use crate::executor::AsyncDatabaseExecutor;
use crate::pool::MiddlewarePoolConnection;
use crate::results::ResultSet;

use state::QueryBuilderState;
use transaction::TransactionState;

/// Request-scoped legacy database handle.
///
/// Owns one connection plus the clause accumulator. Clause methods only record;
/// terminal methods (`get`, `insert`, `update`, `delete`, `get_compiled_*`, ...)
/// replay what was recorded, run it, and reset.
///
/// ```rust,no_run
/// use legacy_qb::prelude::*;
///
/// # async fn demo(cap: &ConfigAndPool) -> Result<(), BridgeError> {
/// let mut db = cap.legacy().await?;
/// let rows = db
///     .select("id, name")
///     .where_("active", true)
///     .order_by("name", "ASC")
///     .get("users", None, None)
///     .await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub struct LegacyDb<E: AsyncDatabaseExecutor = MiddlewarePoolConnection> {
    conn: E,
    state: QueryBuilderState,
    trans: TransactionState,
    last_query: Option<String>,
    affected_rows: usize,
}

impl<E: AsyncDatabaseExecutor> std::fmt::Debug for LegacyDb<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyDb")
            .field("state", &self.state)
            .field("trans", &self.trans)
            .field("last_query", &self.last_query)
            .finish_non_exhaustive()
    }
}

impl<E: AsyncDatabaseExecutor> Drop for LegacyDb<E> {
    fn drop(&mut self) {
        if self.trans.in_progress() {
            warn!("legacy handle dropped with an open transaction");
        }
    }
}

impl<E: AsyncDatabaseExecutor> LegacyDb<E> {
    pub fn new(conn: E) -> Self {
        Self {
            conn,
            state: QueryBuilderState::default(),
            trans: TransactionState::default(),
            last_query: None,
            affected_rows: 0,
        }
    }

    /// Borrow the underlying connection.
    pub fn connection(&mut self) -> &mut E {
        &mut self.conn
    }

    /// `true` when no clause is recorded and no table is bound.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.state.is_clean()
    }

    async fn run_select(&mut self, query: &CompiledQuery) -> Result<ResultSet, BridgeError> {
        let (sql, params) = query.to_bound();
        self.last_query = Some(query.to_sql());
        debug!(sql = %sql, params = params.len(), "select");
        match self.conn.execute_select(&sql, &params).await {
            Ok(set) => Ok(set),
            Err(err) => {
                self.trans.mark_failed();
                Err(err)
            }
        }
    }

    /// Run a write statement. Inside a transaction a failure marks the
    /// transaction failed and yields `None` instead of an error.
    async fn run_write(&mut self, query: &CompiledQuery) -> Result<Option<usize>, BridgeError> {
        let (sql, params) = query.to_bound();
        self.last_query = Some(query.to_sql());
        debug!(sql = %sql, params = params.len(), "write");
        match self.conn.execute_dml(&sql, &params).await {
            Ok(rows) => {
                self.affected_rows = rows;
                Ok(Some(rows))
            }
            Err(err) if self.trans.in_progress() => {
                warn!(error = %err, "statement failed inside transaction");
                self.trans.mark_failed();
                self.affected_rows = 0;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// The connection seam the legacy facade forwards every statement through.
#[async_trait]
pub trait AsyncDatabaseExecutor: Send {
    /// Executes a batch of SQL statements. No parameters are supported.
    async fn execute_batch(&mut self, query: &str) -> Result<(), BridgeError>;

    /// Executes a single SELECT statement and returns the result set.
    async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, BridgeError>;

    /// Executes a single DML statement (INSERT, UPDATE, DELETE, etc.) and returns the number of rows affected.
    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, BridgeError>;
}

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::executor::AsyncDatabaseExecutor;
use crate::results::ResultSet;
use crate::sqlite::SqliteConnection;
use crate::types::RowValues;

/// A connection checked out of a [`MiddlewarePool`](super::MiddlewarePool).
#[derive(Debug)]
pub enum MiddlewarePoolConnection {
    Sqlite { conn: SqliteConnection },
}

#[async_trait]
impl AsyncDatabaseExecutor for MiddlewarePoolConnection {
    async fn execute_batch(&mut self, query: &str) -> Result<(), BridgeError> {
        match self {
            MiddlewarePoolConnection::Sqlite { conn } => conn.execute_batch(query).await,
        }
    }

    async fn execute_select(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, BridgeError> {
        match self {
            MiddlewarePoolConnection::Sqlite { conn } => conn.execute_select(query, params).await,
        }
    }

    async fn execute_dml(
        &mut self,
        query: &str,
        params: &[RowValues],
    ) -> Result<usize, BridgeError> {
        match self {
            MiddlewarePoolConnection::Sqlite { conn } => conn.execute_dml(query, params).await,
        }
    }
}

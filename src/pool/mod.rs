pub mod connection;

use bb8::Pool;

pub use connection::MiddlewarePoolConnection;

use crate::error::BridgeError;
use crate::legacy::LegacyDb;
use crate::sqlite::{SqliteConnection, SqliteManager};
use crate::types::DatabaseType;

/// Connection pool for database access
#[derive(Clone)]
pub enum MiddlewarePool {
    /// `SQLite` connection pool
    Sqlite(Pool<SqliteManager>),
}

impl std::fmt::Debug for MiddlewarePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(pool) => f.debug_tuple("Sqlite").field(&pool.state()).finish(),
        }
    }
}

impl MiddlewarePool {
    /// Get a connection from the pool
    ///
    /// # Errors
    /// Returns `BridgeError::ConnectionError` if the pool fails to provide a connection.
    pub async fn get_connection(
        pool: &MiddlewarePool,
    ) -> Result<MiddlewarePoolConnection, BridgeError> {
        match pool {
            MiddlewarePool::Sqlite(pool) => {
                let conn = pool.get_owned().await.map_err(|e| {
                    BridgeError::ConnectionError(format!("sqlite checkout error: {e}"))
                })?;
                Ok(MiddlewarePoolConnection::Sqlite {
                    conn: SqliteConnection::new(conn),
                })
            }
        }
    }
}

/// Configuration and connection pool for a database
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    /// The connection pool
    pub pool: MiddlewarePool,
    /// The database type
    pub db_type: DatabaseType,
}

impl ConfigAndPool {
    /// Check out a pooled connection.
    ///
    /// # Errors
    /// Returns `BridgeError` if the pool cannot hand out a connection.
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, BridgeError> {
        MiddlewarePool::get_connection(&self.pool).await
    }

    /// Check out a connection and wrap it in a request-scoped legacy facade.
    ///
    /// # Errors
    /// Returns `BridgeError` if the pool cannot hand out a connection.
    pub async fn legacy(&self) -> Result<LegacyDb<MiddlewarePoolConnection>, BridgeError> {
        Ok(LegacyDb::new(self.get_connection().await?))
    }
}

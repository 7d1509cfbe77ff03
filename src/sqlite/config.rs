use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::BridgeError;
use crate::pool::{ConfigAndPool, MiddlewarePool};
use crate::types::DatabaseType;

use super::connection::run_blocking;

/// Shared handle to a raw `rusqlite` connection; blocking work locks it on a worker thread.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

/// Pooled connection checked out of a [`SqliteManager`] pool.
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// bb8 manager opening `SQLite` connections against one database path.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout_ms: u32,
}

impl SqliteManager {
    #[must_use]
    pub fn new(db_path: String, busy_timeout_ms: u32) -> Self {
        Self {
            db_path,
            busy_timeout_ms,
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `BridgeError` if creating the pool fails.
    pub async fn build_pool(self, max_size: u32) -> Result<Pool<SqliteManager>, BridgeError> {
        Pool::builder()
            .max_size(max_size)
            .build(self)
            .await
            .map_err(|e| BridgeError::ConnectionError(format!("sqlite pool error: {e}")))
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = BridgeError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let path = self.db_path.clone();
        let busy_timeout_ms = self.busy_timeout_ms;
        async move {
            let conn = tokio::task::spawn_blocking(move || {
                let conn = rusqlite::Connection::open(&path)?;
                conn.busy_timeout(Duration::from_millis(u64::from(busy_timeout_ms)))?;
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
                Ok::<_, BridgeError>(conn)
            })
            .await
            .map_err(|e| {
                BridgeError::ConnectionError(format!("sqlite connect join error: {e}"))
            })??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(BridgeError::SqliteError)
            })
            .await
        }
    }

    /// A connection handed back while still inside `BEGIN`, or while a
    /// detached statement still holds it, is discarded; closing it rolls the
    /// open transaction back.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        let broken = match conn.try_lock() {
            Ok(guard) => !guard.is_autocommit(),
            Err(_) => true,
        };
        if broken {
            warn!(db_path = %self.db_path, "discarding sqlite connection returned mid-transaction");
        }
        broken
    }
}

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u32,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            max_connections: 4,
            busy_timeout_ms: 5000,
        }
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.opts.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, busy_timeout_ms: u32) -> Self {
        self.opts.busy_timeout_ms = busy_timeout_ms;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError` if pool creation or the initial smoke test fails.
    pub async fn build(self) -> Result<ConfigAndPool, BridgeError> {
        ConfigAndPool::new_sqlite(self.finish()).await
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn sqlite_builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Asynchronous initializer for `ConfigAndPool` with `SQLite` using bb8.
    ///
    /// # Errors
    /// Returns `BridgeError::ConnectionError` if pool creation or the connection test fails.
    pub async fn new_sqlite(opts: SqliteOptions) -> Result<Self, BridgeError> {
        if opts.max_connections == 0 {
            return Err(BridgeError::ConfigError(
                "max_connections must be at least 1".into(),
            ));
        }
        let manager = SqliteManager::new(opts.db_path.clone(), opts.busy_timeout_ms);
        let pool = manager.build_pool(opts.max_connections).await?;

        {
            let conn = pool.get().await?;
            let handle = Arc::clone(&*conn);
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(BridgeError::SqliteError)
            })
            .await?;
        }

        tracing::debug!(db_path = %opts.db_path, "sqlite pool ready");

        Ok(ConfigAndPool {
            pool: MiddlewarePool::Sqlite(pool),
            db_type: DatabaseType::Sqlite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_transaction_marks_connection_broken() {
        let manager = SqliteManager::new(":memory:".into(), 1000);
        let mut conn = manager.connect().await.unwrap();
        assert!(!manager.has_broken(&mut conn));

        conn.lock().await.execute_batch("BEGIN").unwrap();
        assert!(manager.has_broken(&mut conn));

        conn.lock().await.execute_batch("ROLLBACK").unwrap();
        assert!(!manager.has_broken(&mut conn));
    }

    #[tokio::test]
    async fn held_connection_is_broken() {
        let manager = SqliteManager::new(":memory:".into(), 1000);
        let mut conn = manager.connect().await.unwrap();
        let other = Arc::clone(&conn);
        let _guard = other.lock().await;
        assert!(manager.has_broken(&mut conn));
    }
}

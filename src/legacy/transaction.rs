use tracing::{info, warn};

use super::LegacyDb;
use crate::error::BridgeError;
use crate::executor::AsyncDatabaseExecutor;

/// Transaction bookkeeping for one request-scoped connection.
#[derive(Debug, Clone)]
pub(crate) struct TransactionState {
    enabled: bool,
    strict: bool,
    depth: u32,
    status: bool,
    // set by test mode; forces the next completion to roll back
    failure: bool,
}

impl Default for TransactionState {
    fn default() -> Self {
        Self {
            enabled: true,
            strict: true,
            depth: 0,
            status: true,
            failure: false,
        }
    }
}

impl TransactionState {
    pub(crate) fn in_progress(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn mark_failed(&mut self) {
        if self.in_progress() {
            self.status = false;
        }
    }
}

impl<E: AsyncDatabaseExecutor> LegacyDb<E> {
    /// Open a transaction group. Nested calls only deepen the group.
    ///
    /// Returns `false` when transactions are switched off.
    ///
    /// # Errors
    /// Propagates a failing `BEGIN`.
    pub async fn trans_start(&mut self, test_mode: bool) -> Result<bool, BridgeError> {
        if !self.trans.enabled {
            return Ok(false);
        }
        self.trans_begin(test_mode).await
    }

    /// Close the group opened by [`trans_start`](Self::trans_start): roll back
    /// when a statement failed or test mode is on, commit otherwise.
    ///
    /// Returns `false` when the group was rolled back.
    ///
    /// # Errors
    /// Propagates a failing `COMMIT` or `ROLLBACK`.
    pub async fn trans_complete(&mut self) -> Result<bool, BridgeError> {
        if !self.trans.enabled {
            return Ok(false);
        }
        if !self.trans.status || self.trans.failure {
            warn!(depth = self.trans.depth, "transaction group failed, rolling back");
            self.trans_rollback().await?;
            if !self.trans.strict {
                self.trans.status = true;
            }
            return Ok(false);
        }
        self.trans_commit().await
    }

    /// `false` once any statement inside a group has failed.
    #[must_use]
    pub fn trans_status(&self) -> bool {
        self.trans.status
    }

    /// Begin a manually managed transaction.
    ///
    /// # Errors
    /// Propagates a failing `BEGIN`.
    pub async fn trans_begin(&mut self, test_mode: bool) -> Result<bool, BridgeError> {
        if !self.trans.enabled {
            return Ok(false);
        }
        if self.trans.depth > 0 {
            self.trans.depth += 1;
            return Ok(true);
        }
        self.trans.failure = test_mode;
        self.conn.execute_batch("BEGIN").await?;
        self.trans.depth = 1;
        info!(test_mode, "transaction started");
        Ok(true)
    }

    /// Commit the outermost transaction; inner levels only unwind.
    /// Returns `false` outside a transaction.
    ///
    /// # Errors
    /// Propagates a failing `COMMIT`.
    pub async fn trans_commit(&mut self) -> Result<bool, BridgeError> {
        if !self.trans.enabled || self.trans.depth == 0 {
            return Ok(false);
        }
        if self.trans.depth == 1 {
            self.conn.execute_batch("COMMIT").await?;
            info!("transaction committed");
        }
        self.trans.depth -= 1;
        Ok(true)
    }

    /// Roll back the outermost transaction; inner levels only unwind.
    /// Returns `false` outside a transaction.
    ///
    /// # Errors
    /// Propagates a failing `ROLLBACK`.
    pub async fn trans_rollback(&mut self) -> Result<bool, BridgeError> {
        if !self.trans.enabled || self.trans.depth == 0 {
            return Ok(false);
        }
        if self.trans.depth == 1 {
            self.conn.execute_batch("ROLLBACK").await?;
            info!("transaction rolled back");
        }
        self.trans.depth -= 1;
        Ok(true)
    }

    /// Strict mode keeps a failed status across later groups.
    pub fn trans_strict(&mut self, mode: bool) {
        self.trans.strict = mode;
    }

    /// Disable transactions for this connection.
    pub fn trans_off(&mut self) {
        self.trans.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use crate::legacy::LegacyDb;
    use crate::legacy::test_support::RecordingExecutor;

    fn db() -> LegacyDb<RecordingExecutor> {
        LegacyDb::new(RecordingExecutor::default())
    }

    #[tokio::test]
    async fn nested_groups_issue_one_begin_and_commit() {
        let mut db = db();
        assert!(db.trans_start(false).await.unwrap());
        assert!(db.trans_start(false).await.unwrap());
        assert!(db.trans_complete().await.unwrap());
        assert!(db.trans_complete().await.unwrap());
        assert_eq!(db.connection().sql(), ["BEGIN", "COMMIT"]);
    }

    #[tokio::test]
    async fn test_mode_rolls_back() {
        let mut db = db();
        db.trans_start(true).await.unwrap();
        assert!(!db.trans_complete().await.unwrap());
        assert!(db.trans_status());
        assert_eq!(db.connection().sql(), ["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn commit_outside_transaction_is_false() {
        let mut db = db();
        assert!(!db.trans_commit().await.unwrap());
        assert!(!db.trans_rollback().await.unwrap());
        assert!(db.connection().statements.is_empty());
    }

    #[tokio::test]
    async fn trans_off_skips_the_database() {
        let mut db = db();
        db.trans_off();
        assert!(!db.trans_start(false).await.unwrap());
        assert!(!db.trans_begin(false).await.unwrap());
        assert!(!db.trans_complete().await.unwrap());
        assert!(db.connection().statements.is_empty());
    }

    #[tokio::test]
    async fn strict_mode_keeps_failure_across_groups() {
        let mut db = LegacyDb::new(RecordingExecutor {
            fail_writes: true,
            ..RecordingExecutor::default()
        });
        db.trans_start(false).await.unwrap();
        db.query("INSERT INTO t VALUES (1)", &[], None).await.unwrap();
        assert!(!db.trans_complete().await.unwrap());
        assert!(!db.trans_status());

        db.trans_strict(false);
        db.trans_start(false).await.unwrap();
        db.query("INSERT INTO t VALUES (1)", &[], None).await.unwrap();
        assert!(!db.trans_complete().await.unwrap());
        assert!(db.trans_status());
    }
}

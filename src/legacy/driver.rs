use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use super::LegacyDb;
use super::binds::bind_markers;
use crate::builder::protect_identifiers;
use crate::error::BridgeError;
use crate::escape;
use crate::executor::AsyncDatabaseExecutor;
use crate::results::DbResult;
use crate::types::RowValues;

lazy_static! {
    static ref WRITE_TYPE: Regex = Regex::new(
        r#"(?i)^\s*"?(SET|INSERT|UPDATE|DELETE|REPLACE|CREATE|DROP|TRUNCATE|LOAD|COPY|ALTER|RENAME|GRANT|REVOKE|LOCK|UNLOCK|REINDEX|MERGE)\s"#
    )
    .expect("valid regex");
}

/// What a raw [`LegacyDb::query`] call produced.
#[derive(Debug)]
pub enum QueryOutcome {
    /// A read statement's rows.
    Rows(DbResult),
    /// A write statement's affected row count.
    Affected(usize),
    /// The statement failed inside a transaction; the transaction is marked failed.
    Failed,
}

impl QueryOutcome {
    /// The rows, if this was a read.
    #[must_use]
    pub fn into_result(self) -> Option<DbResult> {
        match self {
            QueryOutcome::Rows(result) => Some(result),
            QueryOutcome::Affected(_) | QueryOutcome::Failed => None,
        }
    }
}

/// Whether `sql` is a write-type statement.
#[must_use]
pub fn is_write_type(sql: &str) -> bool {
    WRITE_TYPE.is_match(sql)
}

impl<E: AsyncDatabaseExecutor> LegacyDb<E> {
    /// Run a raw statement, substituting `?` markers with `binds` in order.
    ///
    /// # Errors
    /// `NotImplemented` when `return_object` is given, `ParameterError` when
    /// markers and binds disagree, and backend errors outside a transaction.
    pub async fn query(
        &mut self,
        sql: &str,
        binds: &[RowValues],
        return_object: Option<bool>,
    ) -> Result<QueryOutcome, BridgeError> {
        if return_object.is_some() {
            return Err(BridgeError::NotImplemented(
                "return_object is not implemented yet".into(),
            ));
        }
        let compiled = bind_markers(sql, binds)?;
        if is_write_type(sql) {
            return Ok(match self.run_write(&compiled).await? {
                Some(rows) => QueryOutcome::Affected(rows),
                None => QueryOutcome::Failed,
            });
        }
        match self.run_select(&compiled).await {
            Ok(set) => Ok(QueryOutcome::Rows(DbResult::new(set))),
            Err(err) if self.trans.in_progress() => {
                warn!(error = %err, "query failed inside transaction");
                Ok(QueryOutcome::Failed)
            }
            Err(err) => Err(err),
        }
    }

    /// Inline SQL literal for `value`.
    #[must_use]
    pub fn escape(&self, value: &RowValues) -> String {
        escape::escape(value)
    }

    #[must_use]
    pub fn escape_str(&self, value: &str, like: bool) -> String {
        escape::escape_str(value, like)
    }

    #[must_use]
    pub fn escape_like_str(&self, value: &str) -> String {
        escape::escape_like_str(value)
    }

    /// Quote `table.column` style identifiers.
    #[must_use]
    pub fn escape_identifiers(&self, item: &str) -> String {
        protect_identifiers(item)
    }

    /// The last statement sent to the database, with values inlined.
    #[must_use]
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Rows touched by the last write statement.
    #[must_use]
    pub fn affected_rows(&self) -> usize {
        self.affected_rows
    }

    /// Row id of the last successful insert on this connection.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub async fn insert_id(&mut self) -> Result<i64, BridgeError> {
        let set = self
            .conn
            .execute_select("SELECT last_insert_rowid() AS id", &[])
            .await?;
        Ok(set
            .results
            .first()
            .and_then(|row| row.get_by_index(0))
            .and_then(RowValues::as_int)
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::test_support::RecordingExecutor;

    #[test]
    fn classifies_write_statements() {
        assert!(is_write_type("INSERT INTO t VALUES (1)"));
        assert!(is_write_type("  update t set a = 1"));
        assert!(is_write_type("\"DELETE\" FROM t"));
        assert!(!is_write_type("SELECT * FROM t"));
        assert!(!is_write_type("PRAGMA table_info(t)"));
    }

    #[tokio::test]
    async fn return_object_is_not_implemented() {
        let mut db = LegacyDb::new(RecordingExecutor::default());
        let err = db.query("SELECT 1", &[], Some(true)).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotImplemented(_)));
        assert!(db.connection().statements.is_empty());
    }

    #[tokio::test]
    async fn query_binds_and_dispatches() {
        let mut db = LegacyDb::new(RecordingExecutor::default());
        let outcome = db
            .query("UPDATE t SET a = ? WHERE id = ?", &["x".into(), 2.into()], None)
            .await
            .unwrap();
        assert!(matches!(outcome, QueryOutcome::Affected(1)));
        assert_eq!(db.last_query(), Some("UPDATE t SET a = 'x' WHERE id = 2"));
        assert_eq!(db.connection().sql(), ["UPDATE t SET a = ?1 WHERE id = ?2"]);

        let outcome = db.query("SELECT * FROM t", &[], None).await.unwrap();
        assert!(matches!(outcome, QueryOutcome::Rows(_)));
    }

    #[tokio::test]
    async fn failed_write_inside_transaction_marks_status() {
        let mut db = LegacyDb::new(RecordingExecutor {
            fail_writes: true,
            ..RecordingExecutor::default()
        });
        assert!(db.trans_start(false).await.unwrap());
        let outcome = db.query("INSERT INTO t VALUES (1)", &[], None).await.unwrap();
        assert!(matches!(outcome, QueryOutcome::Failed));
        assert!(!db.trans_status());
        assert!(!db.trans_complete().await.unwrap());
        assert_eq!(
            db.connection().sql(),
            ["BEGIN", "INSERT INTO t VALUES (1)", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn failed_write_outside_transaction_propagates() {
        let mut db = LegacyDb::new(RecordingExecutor {
            fail_writes: true,
            ..RecordingExecutor::default()
        });
        let err = db.query("DELETE FROM t", &[], None).await.unwrap_err();
        assert!(matches!(err, BridgeError::ExecutionError(_)));
    }
}

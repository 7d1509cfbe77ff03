use super::LegacyDb;
use super::clause::PendingClause;
use super::state::Flow;
use crate::builder::{Aggregate, CompiledQuery, Direction, Glue, JoinType, LikeSide, SetValue};
use crate::error::BridgeError;
use crate::executor::AsyncDatabaseExecutor;
use crate::results::{DbResult, ResultSet};
use crate::types::{RowMap, RowValues};

const DEFAULT_BATCH_SIZE: usize = 100;

fn count_from(set: &ResultSet) -> i64 {
    set.results
        .first()
        .and_then(|row| row.get("numrows").or_else(|| row.get_by_index(0)))
        .and_then(RowValues::as_int)
        .copied()
        .unwrap_or(0)
}

// Clause recording. Nothing here touches the database or fails.
impl<E: AsyncDatabaseExecutor> LegacyDb<E> {
    /// Add select columns; a comma list is split and each column quoted.
    pub fn select(&mut self, columns: &str) -> &mut Self {
        self.state.push_select(PendingClause::Select {
            columns: columns.to_owned(),
            escape: None,
        });
        self
    }

    /// Add select columns exactly as written.
    pub fn select_unescaped(&mut self, columns: &str) -> &mut Self {
        self.state.push_select(PendingClause::Select {
            columns: columns.to_owned(),
            escape: Some(false),
        });
        self
    }

    fn select_agg(&mut self, func: Aggregate, field: &str, alias: &str) -> &mut Self {
        self.state.push_select_agg(PendingClause::SelectAgg {
            func,
            field: field.to_owned(),
            alias: alias.to_owned(),
        });
        self
    }

    pub fn select_sum(&mut self, field: &str, alias: &str) -> &mut Self {
        self.select_agg(Aggregate::Sum, field, alias)
    }

    pub fn select_max(&mut self, field: &str, alias: &str) -> &mut Self {
        self.select_agg(Aggregate::Max, field, alias)
    }

    pub fn select_min(&mut self, field: &str, alias: &str) -> &mut Self {
        self.select_agg(Aggregate::Min, field, alias)
    }

    pub fn select_avg(&mut self, field: &str, alias: &str) -> &mut Self {
        self.select_agg(Aggregate::Avg, field, alias)
    }

    pub fn select_count(&mut self, field: &str, alias: &str) -> &mut Self {
        self.select_agg(Aggregate::Count, field, alias)
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.state.set_distinct(true);
        self
    }

    /// Bind the table on first use; later calls add more FROM tables.
    pub fn from(&mut self, table: &str) -> &mut Self {
        self.state.push_from(table);
        self
    }

    /// `kind` is a legacy join type (`"left"`, `"inner"`, ...); empty means plain `JOIN`.
    pub fn join(&mut self, table: &str, cond: &str, kind: &str) -> &mut Self {
        self.join_escaped(table, cond, kind, None)
    }

    pub fn join_escaped(
        &mut self,
        table: &str,
        cond: &str,
        kind: &str,
        escape: Option<bool>,
    ) -> &mut Self {
        self.state.push_join(PendingClause::Join {
            table: table.to_owned(),
            cond: cond.to_owned(),
            kind: JoinType::from_legacy(kind),
            escape,
        });
        self
    }

    fn push_where(&mut self, glue: Glue, key: &str, value: RowValues, escape: Option<bool>) {
        self.state.push_condition(PendingClause::Where {
            glue,
            key: key.to_owned(),
            value,
            escape,
        });
    }

    /// `key` may end with an operator: `where_("age >", 18)`.
    pub fn where_(&mut self, key: &str, value: impl Into<RowValues>) -> &mut Self {
        self.push_where(Glue::And, key, value.into(), None);
        self
    }

    /// Like [`where_`](Self::where_) but with identifier quoting controlled by `escape`.
    pub fn where_escaped(
        &mut self,
        key: &str,
        value: impl Into<RowValues>,
        escape: Option<bool>,
    ) -> &mut Self {
        self.push_where(Glue::And, key, value.into(), escape);
        self
    }

    /// A condition written verbatim.
    pub fn where_raw(&mut self, sql: &str) -> &mut Self {
        self.state.push_condition(PendingClause::WhereRaw {
            glue: Glue::And,
            sql: sql.to_owned(),
        });
        self
    }

    /// One AND-ed condition per entry, in map order.
    pub fn where_map(&mut self, conditions: RowMap) -> &mut Self {
        for (key, value) in conditions {
            self.push_where(Glue::And, &key, value, None);
        }
        self
    }

    pub fn or_where(&mut self, key: &str, value: impl Into<RowValues>) -> &mut Self {
        self.push_where(Glue::Or, key, value.into(), None);
        self
    }

    pub fn or_where_raw(&mut self, sql: &str) -> &mut Self {
        self.state.push_condition(PendingClause::WhereRaw {
            glue: Glue::Or,
            sql: sql.to_owned(),
        });
        self
    }

    fn push_where_in<V: Into<RowValues>>(
        &mut self,
        glue: Glue,
        not: bool,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.state.push_condition(PendingClause::WhereIn {
            glue,
            not,
            key: key.to_owned(),
            values: values.into_iter().map(Into::into).collect(),
            escape: None,
        });
        self
    }

    pub fn where_in<V: Into<RowValues>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.push_where_in(Glue::And, false, key, values)
    }

    pub fn or_where_in<V: Into<RowValues>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.push_where_in(Glue::Or, false, key, values)
    }

    pub fn where_not_in<V: Into<RowValues>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.push_where_in(Glue::And, true, key, values)
    }

    pub fn or_where_not_in<V: Into<RowValues>>(
        &mut self,
        key: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        self.push_where_in(Glue::Or, true, key, values)
    }

    fn push_group_start(&mut self, glue: Glue, not: bool) -> &mut Self {
        self.state
            .push_condition(PendingClause::GroupStart { glue, not });
        self
    }

    pub fn group_start(&mut self) -> &mut Self {
        self.push_group_start(Glue::And, false)
    }

    pub fn or_group_start(&mut self) -> &mut Self {
        self.push_group_start(Glue::Or, false)
    }

    pub fn not_group_start(&mut self) -> &mut Self {
        self.push_group_start(Glue::And, true)
    }

    pub fn or_not_group_start(&mut self) -> &mut Self {
        self.push_group_start(Glue::Or, true)
    }

    pub fn group_end(&mut self) -> &mut Self {
        self.state.push_condition(PendingClause::GroupEnd);
        self
    }

    fn push_like(&mut self, glue: Glue, not: bool, field: &str, pattern: &str, side: &str) -> &mut Self {
        self.state.push_like(PendingClause::Like {
            glue,
            not,
            field: field.to_owned(),
            pattern: pattern.to_owned(),
            side: LikeSide::from_legacy(side),
            escape: None,
        });
        self
    }

    /// `side` is `"both"`, `"before"`, `"after"` or `"none"`.
    pub fn like(&mut self, field: &str, pattern: &str, side: &str) -> &mut Self {
        self.push_like(Glue::And, false, field, pattern, side)
    }

    pub fn or_like(&mut self, field: &str, pattern: &str, side: &str) -> &mut Self {
        self.push_like(Glue::Or, false, field, pattern, side)
    }

    pub fn not_like(&mut self, field: &str, pattern: &str, side: &str) -> &mut Self {
        self.push_like(Glue::And, true, field, pattern, side)
    }

    pub fn or_not_like(&mut self, field: &str, pattern: &str, side: &str) -> &mut Self {
        self.push_like(Glue::Or, true, field, pattern, side)
    }

    pub fn group_by(&mut self, fields: &str) -> &mut Self {
        self.state.push_group_by(PendingClause::GroupBy {
            fields: fields.to_owned(),
            escape: None,
        });
        self
    }

    /// `direction` is `"ASC"`, `"DESC"`, `"RANDOM"` or empty.
    pub fn order_by(&mut self, field: &str, direction: &str) -> &mut Self {
        self.state.push_order_by(PendingClause::OrderBy {
            field: field.to_owned(),
            direction: Direction::from_legacy(direction),
            escape: None,
        });
        self
    }

    /// A limit of 0 means no limit.
    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.state.set_limit(Some(limit), offset);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.state.set_limit(None, Some(offset));
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<RowValues>) -> &mut Self {
        self.state.push_set(PendingClause::Set {
            key: key.to_owned(),
            value: SetValue::Bind(value.into()),
            escape: None,
        });
        self
    }

    /// Set a column to a raw SQL expression, e.g. `set_unescaped("hits", "hits + 1")`.
    pub fn set_unescaped(&mut self, key: &str, sql: &str) -> &mut Self {
        self.state.push_set(PendingClause::Set {
            key: key.to_owned(),
            value: SetValue::Raw(sql.to_owned()),
            escape: Some(false),
        });
        self
    }

    /// Record every entry of `values`; with `escape = Some(false)` text values
    /// are written as raw SQL and keys are not quoted.
    pub fn set_map(&mut self, values: RowMap, escape: Option<bool>) -> &mut Self {
        for (key, value) in values {
            self.state.push_set(PendingClause::Set {
                key,
                value: SetValue::from_value(value, escape),
                escape,
            });
        }
        self
    }
}

// Terminal operations.
impl<E: AsyncDatabaseExecutor> LegacyDb<E> {
    fn compile(&self, flow: Flow) -> Result<CompiledQuery, BridgeError> {
        let builder = self.state.replay(flow)?;
        match flow {
            Flow::Select => builder.compile_select(),
            Flow::Count => builder.compile_count(),
            Flow::Insert => builder.compile_insert(),
            Flow::Update => builder.compile_update(),
            Flow::Delete => builder.compile_delete(),
        }
    }

    /// Compile for `flow`, then reset whatever the outcome.
    fn take_compiled(&mut self, flow: Flow) -> Result<CompiledQuery, BridgeError> {
        let compiled = self.compile(flow);
        self.state.reset();
        compiled
    }

    /// Run the recorded select against `table` (or the table bound by `from`).
    ///
    /// # Errors
    /// `Precondition` when no table is known; compile and backend errors otherwise.
    pub async fn get(
        &mut self,
        table: &str,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<DbResult, BridgeError> {
        self.state.ensure_bound(table)?;
        self.state.set_limit(limit, offset);
        let compiled = self.take_compiled(Flow::Select)?;
        Ok(DbResult::new(self.run_select(&compiled).await?))
    }

    /// [`get`](Self::get) with extra AND-ed equality conditions.
    ///
    /// # Errors
    /// As for [`get`](Self::get).
    pub async fn get_where(
        &mut self,
        table: &str,
        conditions: Option<RowMap>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<DbResult, BridgeError> {
        self.state.ensure_bound(table)?;
        if let Some(conditions) = conditions {
            self.where_map(conditions);
        }
        self.get("", limit, offset).await
    }

    /// Count every row of the table, ignoring recorded clauses.
    ///
    /// # Errors
    /// `Precondition` when no table is known; backend errors otherwise.
    pub async fn count_all(&mut self, table: &str) -> Result<i64, BridgeError> {
        self.state.ensure_bound(table)?;
        let compiled = self.state.pristine().and_then(|b| b.compile_count_all());
        self.state.reset();
        let set = self.run_select(&compiled?).await?;
        Ok(count_from(&set))
    }

    /// Count the rows the recorded select would return.
    ///
    /// # Errors
    /// `Precondition` when no table is known; compile and backend errors otherwise.
    pub async fn count_all_results(&mut self, table: &str, reset: bool) -> Result<i64, BridgeError> {
        self.state.ensure_bound(table)?;
        let compiled = self.compile(Flow::Count);
        if reset {
            self.state.reset();
        }
        let set = self.run_select(&compiled?).await?;
        Ok(count_from(&set))
    }

    /// Insert one row from `values` plus anything recorded with `set`.
    ///
    /// Returns `false` when the statement failed inside a transaction.
    ///
    /// # Errors
    /// `Precondition` without a table, `ParameterError` without values,
    /// backend errors outside a transaction.
    pub async fn insert(
        &mut self,
        table: &str,
        values: Option<RowMap>,
        escape: Option<bool>,
    ) -> Result<bool, BridgeError> {
        self.state.ensure_bound(table)?;
        if let Some(values) = values {
            self.set_map(values, escape);
        }
        let compiled = self.take_compiled(Flow::Insert)?;
        Ok(self.run_write(&compiled).await?.is_some())
    }

    /// The INSERT statement `insert` would run, as text.
    ///
    /// # Errors
    /// `Precondition` without a table, `ParameterError` without values.
    pub fn insert_string(&mut self, table: &str, values: RowMap) -> Result<String, BridgeError> {
        self.state.ensure_bound(table)?;
        self.set_map(values, None);
        Ok(self.take_compiled(Flow::Insert)?.to_sql())
    }

    /// Insert `rows` in chunks of `batch_size` (0 means the default of 100).
    ///
    /// Returns the number of rows inserted. Inside a transaction a failing
    /// chunk stops the batch and the rows inserted so far are reported.
    ///
    /// # Errors
    /// `Precondition` without a table, `ParameterError` for an empty batch or
    /// mismatched rows, backend errors outside a transaction.
    pub async fn insert_batch(
        &mut self,
        table: &str,
        rows: &[RowMap],
        escape: Option<bool>,
        batch_size: usize,
    ) -> Result<usize, BridgeError> {
        self.state.ensure_bound(table)?;
        let builder = self.state.pristine();
        self.state.reset();
        let builder = builder?;
        if rows.is_empty() {
            return Err(BridgeError::ParameterError(
                "insert_batch called without any rows".into(),
            ));
        }
        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };
        let mut inserted = 0;
        for chunk in rows.chunks(batch_size) {
            let compiled = builder.compile_insert_batch(chunk, escape)?;
            match self.run_write(&compiled).await? {
                Some(rows) => inserted += rows,
                None => break,
            }
        }
        self.affected_rows = inserted;
        Ok(inserted)
    }

    /// Update rows matching the recorded conditions plus `conditions`.
    ///
    /// # Errors
    /// `Precondition` without a table, `ParameterError` without values,
    /// `NotSupported` with a limit, backend errors outside a transaction.
    pub async fn update(
        &mut self,
        table: &str,
        values: Option<RowMap>,
        conditions: Option<RowMap>,
        limit: Option<u64>,
    ) -> Result<bool, BridgeError> {
        self.state.ensure_bound(table)?;
        if let Some(values) = values {
            self.set_map(values, None);
        }
        if let Some(conditions) = conditions {
            self.where_map(conditions);
        }
        self.state.set_limit(limit, None);
        let compiled = self.take_compiled(Flow::Update)?;
        Ok(self.run_write(&compiled).await?.is_some())
    }

    /// Delete rows matching the recorded conditions plus `conditions`.
    /// With `reset_data = false` the recorded clauses survive the call.
    ///
    /// # Errors
    /// `Precondition` without a table, `ParameterError` without any condition,
    /// `NotSupported` with a limit, backend errors outside a transaction.
    pub async fn delete(
        &mut self,
        table: &str,
        conditions: Option<RowMap>,
        limit: Option<u64>,
        reset_data: bool,
    ) -> Result<bool, BridgeError> {
        self.state.ensure_bound(table)?;
        if let Some(conditions) = conditions {
            self.where_map(conditions);
        }
        self.state.set_limit(limit, None);
        let compiled = self.compile(Flow::Delete);
        if reset_data {
            self.state.reset();
        }
        Ok(self.run_write(&compiled?).await?.is_some())
    }

    async fn delete_all(&mut self, table: &str) -> Result<bool, BridgeError> {
        self.state.ensure_bound(table)?;
        let compiled = self.state.pristine().and_then(|b| b.compile_truncate());
        self.state.reset();
        Ok(self.run_write(&compiled?).await?.is_some())
    }

    /// Remove every row of the table.
    ///
    /// # Errors
    /// `Precondition` without a table; backend errors outside a transaction.
    pub async fn truncate(&mut self, table: &str) -> Result<bool, BridgeError> {
        self.delete_all(table).await
    }

    /// Same as [`truncate`](Self::truncate) on SQLite.
    ///
    /// # Errors
    /// `Precondition` without a table; backend errors outside a transaction.
    pub async fn empty_table(&mut self, table: &str) -> Result<bool, BridgeError> {
        self.delete_all(table).await
    }

    fn compiled_text(&mut self, table: &str, flow: Flow, reset: bool) -> Result<String, BridgeError> {
        self.state.ensure_bound(table)?;
        let compiled = self.compile(flow);
        if reset {
            self.state.reset();
        }
        Ok(compiled?.to_sql())
    }

    /// The SELECT `get` would run, with values inlined.
    ///
    /// # Errors
    /// `Precondition` without a table; compile errors.
    pub fn get_compiled_select(&mut self, table: &str, reset: bool) -> Result<String, BridgeError> {
        self.compiled_text(table, Flow::Select, reset)
    }

    /// # Errors
    /// `Precondition` without a table; compile errors.
    pub fn get_compiled_insert(&mut self, table: &str, reset: bool) -> Result<String, BridgeError> {
        self.compiled_text(table, Flow::Insert, reset)
    }

    /// # Errors
    /// `Precondition` without a table; compile errors.
    pub fn get_compiled_update(&mut self, table: &str, reset: bool) -> Result<String, BridgeError> {
        self.compiled_text(table, Flow::Update, reset)
    }

    /// # Errors
    /// `Precondition` without a table; compile errors.
    pub fn get_compiled_delete(&mut self, table: &str, reset: bool) -> Result<String, BridgeError> {
        self.compiled_text(table, Flow::Delete, reset)
    }
}

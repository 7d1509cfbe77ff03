//! Statement compilers for [`TableBuilder`].

use super::{CompiledQuery, Condition, SetValue, TableBuilder, protect_identifiers};
use crate::error::BridgeError;
use crate::types::{RowMap, RowValues};

const COUNT_ALIAS: &str = "\"numrows\"";

impl TableBuilder {
    fn require_table(&self, action: &str) -> Result<String, BridgeError> {
        if self.table.is_empty() {
            return Err(BridgeError::ParameterError(format!(
                "{action} requires a table name"
            )));
        }
        Ok(protect_identifiers(&self.table))
    }

    fn from_list(&self) -> String {
        let mut tables = Vec::with_capacity(self.from.len() + 1);
        if !self.table.is_empty() {
            tables.push(protect_identifiers(&self.table));
        }
        tables.extend(self.from.iter().cloned());
        tables.join(", ")
    }

    /// ` WHERE ...` for the recorded conditions, or an empty query when there are none.
    ///
    /// # Errors
    /// `ExecutionError` when group markers are unbalanced or a group is empty.
    pub fn where_clause(&self) -> Result<CompiledQuery, BridgeError> {
        let mut out = CompiledQuery::new();
        if self.conditions.is_empty() {
            return Ok(out);
        }
        out.push_sql(" WHERE ");
        let mut depth = 0usize;
        // true right after WHERE or an opening parenthesis
        let mut at_start = true;
        for condition in &self.conditions {
            match condition {
                Condition::Expr { glue, fragment } => {
                    if !at_start {
                        out.push_sql(glue.keyword());
                    }
                    out.append(fragment);
                    at_start = false;
                }
                Condition::GroupStart { glue, not } => {
                    if !at_start {
                        out.push_sql(glue.keyword());
                    }
                    out.push_sql(if *not { "NOT (" } else { "(" });
                    depth += 1;
                    at_start = true;
                }
                Condition::GroupEnd => {
                    if depth == 0 {
                        return Err(BridgeError::ExecutionError(
                            "group_end called without a matching group_start".into(),
                        ));
                    }
                    if at_start {
                        return Err(BridgeError::ExecutionError(
                            "condition group closed without any conditions".into(),
                        ));
                    }
                    out.push_sql(")");
                    depth -= 1;
                }
            }
        }
        if depth > 0 {
            return Err(BridgeError::ExecutionError(format!(
                "{depth} condition group(s) left open"
            )));
        }
        Ok(out)
    }

    fn push_body(&self, out: &mut CompiledQuery) -> Result<(), BridgeError> {
        let from = self.from_list();
        if !from.is_empty() {
            out.push_sql(&format!(" FROM {from}"));
        }
        for join in &self.joins {
            out.push_sql(&format!(" {join}"));
        }
        out.append(&self.where_clause()?);
        if !self.group_by.is_empty() {
            out.push_sql(&format!(" GROUP BY {}", self.group_by.join(", ")));
        }
        Ok(())
    }

    fn select_head(&self) -> String {
        let columns = if self.select.is_empty() {
            "*".to_owned()
        } else {
            self.select.join(", ")
        };
        if self.distinct {
            format!("SELECT DISTINCT {columns}")
        } else {
            format!("SELECT {columns}")
        }
    }

    /// `SELECT` with every recorded clause.
    ///
    /// # Errors
    /// `ExecutionError` for unbalanced condition groups.
    pub fn compile_select(&self) -> Result<CompiledQuery, BridgeError> {
        let mut out = CompiledQuery::text(self.select_head());
        self.push_body(&mut out)?;
        if !self.order_by.is_empty() {
            out.push_sql(&format!(" ORDER BY {}", self.order_by.join(", ")));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => out.push_sql(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => out.push_sql(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => out.push_sql(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok(out)
    }

    /// Row count for the recorded clauses, ignoring order and limit.
    /// `DISTINCT` or `GROUP BY` queries are counted through a subquery.
    ///
    /// # Errors
    /// `ExecutionError` for unbalanced condition groups.
    pub fn compile_count(&self) -> Result<CompiledQuery, BridgeError> {
        if self.distinct || !self.group_by.is_empty() {
            let mut inner = CompiledQuery::text(self.select_head());
            self.push_body(&mut inner)?;
            let mut out = CompiledQuery::text(format!("SELECT COUNT(*) AS {COUNT_ALIAS} FROM ("));
            out.append(&inner);
            out.push_sql(") \"count_all_results\"");
            return Ok(out);
        }
        let mut out = CompiledQuery::text(format!("SELECT COUNT(*) AS {COUNT_ALIAS}"));
        self.push_body(&mut out)?;
        Ok(out)
    }

    /// Count of every row in the bound table.
    ///
    /// # Errors
    /// `ParameterError` when no table is bound.
    pub fn compile_count_all(&self) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("count_all")?;
        Ok(CompiledQuery::text(format!(
            "SELECT COUNT(*) AS {COUNT_ALIAS} FROM {table}"
        )))
    }

    /// # Errors
    /// `ParameterError` when nothing was `set` or no table is bound.
    pub fn compile_insert(&self) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("insert")?;
        if self.set.is_empty() {
            return Err(BridgeError::ParameterError(
                "You must use the \"set\" method to insert an entry.".into(),
            ));
        }
        let columns: Vec<&str> = self.set.iter().map(|(k, _)| k.as_str()).collect();
        let mut out = CompiledQuery::text(format!(
            "INSERT INTO {table} ({}) VALUES (",
            columns.join(", ")
        ));
        push_set_values(&mut out, self.set.iter().map(|(_, v)| v));
        out.push_sql(")");
        Ok(out)
    }

    /// Multi-row insert. Columns come from the first row; every other row must
    /// carry the same keys.
    ///
    /// # Errors
    /// `ParameterError` for an empty batch, a row missing a column, or no table.
    pub fn compile_insert_batch(
        &self,
        rows: &[RowMap],
        escape: Option<bool>,
    ) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("insert_batch")?;
        let Some(first) = rows.first() else {
            return Err(BridgeError::ParameterError(
                "insert_batch called without any rows".into(),
            ));
        };
        if first.is_empty() {
            return Err(BridgeError::ParameterError(
                "insert_batch rows must contain at least one column".into(),
            ));
        }
        let keys: Vec<&str> = first.keys().collect();
        let columns: Vec<String> = keys
            .iter()
            .map(|k| {
                if escape == Some(false) {
                    (*k).to_owned()
                } else {
                    protect_identifiers(k)
                }
            })
            .collect();
        let mut out = CompiledQuery::text(format!(
            "INSERT INTO {table} ({}) VALUES ",
            columns.join(", ")
        ));
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != keys.len() {
                return Err(BridgeError::ParameterError(format!(
                    "insert_batch row {idx} has {} columns, expected {}",
                    row.len(),
                    keys.len()
                )));
            }
            if idx > 0 {
                out.push_sql(", ");
            }
            out.push_sql("(");
            for (pos, key) in keys.iter().enumerate() {
                let value = row.get(key).ok_or_else(|| {
                    BridgeError::ParameterError(format!(
                        "insert_batch row {idx} is missing column {key}"
                    ))
                })?;
                if pos > 0 {
                    out.push_sql(", ");
                }
                out.push_bind(value.clone());
            }
            out.push_sql(")");
        }
        Ok(out)
    }

    /// `UPDATE` with the recorded set values and conditions. Joins are ignored.
    ///
    /// # Errors
    /// `ParameterError` when nothing was `set`, `NotSupported` when a limit was
    /// recorded, `ExecutionError` for unbalanced condition groups.
    pub fn compile_update(&self) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("update")?;
        if self.set.is_empty() {
            return Err(BridgeError::ParameterError(
                "You must use the \"set\" method to update an entry.".into(),
            ));
        }
        if self.limit.is_some() {
            return Err(BridgeError::NotSupported(
                "update with a limit is not supported".into(),
            ));
        }
        let mut out = CompiledQuery::text(format!("UPDATE {table} SET "));
        for (idx, (column, value)) in self.set.iter().enumerate() {
            if idx > 0 {
                out.push_sql(", ");
            }
            out.push_sql(&format!("{column} = "));
            push_set_values(&mut out, std::iter::once(value));
        }
        out.append(&self.where_clause()?);
        Ok(out)
    }

    /// `DELETE` restricted by the recorded conditions.
    ///
    /// # Errors
    /// `ParameterError` without any condition, `NotSupported` when a limit was
    /// recorded, `ExecutionError` for unbalanced condition groups.
    pub fn compile_delete(&self) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("delete")?;
        if self.conditions.is_empty() {
            return Err(BridgeError::ParameterError(
                "Deletes are not allowed unless they contain a \"where\" or \"like\" clause."
                    .into(),
            ));
        }
        if self.limit.is_some() {
            return Err(BridgeError::NotSupported(
                "delete with a limit is not supported".into(),
            ));
        }
        let mut out = CompiledQuery::text(format!("DELETE FROM {table}"));
        out.append(&self.where_clause()?);
        Ok(out)
    }

    /// SQLite has no `TRUNCATE`; this is an unconditional delete.
    ///
    /// # Errors
    /// `ParameterError` when no table is bound.
    pub fn compile_truncate(&self) -> Result<CompiledQuery, BridgeError> {
        let table = self.require_table("truncate")?;
        Ok(CompiledQuery::text(format!("DELETE FROM {table}")))
    }
}

fn push_set_values<'a>(out: &mut CompiledQuery, values: impl Iterator<Item = &'a SetValue>) {
    for (idx, value) in values.enumerate() {
        if idx > 0 {
            out.push_sql(", ");
        }
        match value {
            SetValue::Bind(v) => out.push_bind(v.clone()),
            SetValue::Raw(sql) => out.push_sql(sql),
        }
    }
}

impl SetValue {
    /// `Raw` when `escape` is `Some(false)` and the value is text, `Bind` otherwise.
    #[must_use]
    pub fn from_value(value: RowValues, escape: Option<bool>) -> Self {
        match (escape, value) {
            (Some(false), RowValues::Text(sql)) => SetValue::Raw(sql),
            (_, value) => SetValue::Bind(value),
        }
    }
}

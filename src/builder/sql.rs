use std::fmt;
use std::fmt::Write;

use crate::escape::escape;
use crate::types::RowValues;

/// One piece of a compiled statement: literal SQL text or a value to bind.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlPart {
    Text(String),
    Bind(RowValues),
}

/// A compiled statement, kept as parts so it can be rendered either with
/// positional placeholders for execution or with inline literals for display.
///
/// ```rust
/// use legacy_qb::builder::CompiledQuery;
/// use legacy_qb::prelude::*;
///
/// let mut q = CompiledQuery::text("SELECT * FROM \"t\" WHERE \"name\" = ");
/// q.push_bind(RowValues::Text("o'neil".into()));
/// assert_eq!(q.to_sql(), "SELECT * FROM \"t\" WHERE \"name\" = 'o''neil'");
/// assert_eq!(q.to_bound().0, "SELECT * FROM \"t\" WHERE \"name\" = ?1");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    parts: Vec<SqlPart>,
}

impl CompiledQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Text(sql.into())],
        }
    }

    pub fn push_sql(&mut self, sql: &str) {
        if let Some(SqlPart::Text(last)) = self.parts.last_mut() {
            last.push_str(sql);
        } else {
            self.parts.push(SqlPart::Text(sql.to_owned()));
        }
    }

    pub fn push_bind(&mut self, value: RowValues) {
        self.parts.push(SqlPart::Bind(value));
    }

    pub fn append(&mut self, other: &CompiledQuery) {
        for part in &other.parts {
            match part {
                SqlPart::Text(sql) => self.push_sql(sql),
                SqlPart::Bind(value) => self.push_bind(value.clone()),
            }
        }
    }

    /// SQL with `?1`, `?2`, ... placeholders plus the values to bind.
    #[must_use]
    pub fn to_bound(&self) -> (String, Vec<RowValues>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for part in &self.parts {
            match part {
                SqlPart::Text(text) => sql.push_str(text),
                SqlPart::Bind(value) => {
                    params.push(value.clone());
                    let _ = write!(sql, "?{}", params.len());
                }
            }
        }
        (sql, params)
    }

    /// SQL with every bound value inlined as an escaped literal.
    #[must_use]
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for part in &self.parts {
            match part {
                SqlPart::Text(text) => sql.push_str(text),
                SqlPart::Bind(value) => sql.push_str(&escape(value)),
            }
        }
        sql
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

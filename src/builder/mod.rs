//! Table-bound query builder the legacy facade replays its clauses onto.
//!
//! Clause methods render their fragment immediately; the `compile_*` methods
//! in [`compile`] assemble the final statement.

mod compile;
mod ident;
mod sql;

pub use ident::{protect_condition, protect_identifiers, quote_identifier, split_operator};
pub use sql::{CompiledQuery, SqlPart};

use crate::escape::{LIKE_ESCAPE_CHAR, escape_like_wildcards};
use crate::types::RowValues;

/// How a condition attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glue {
    And,
    Or,
}

impl Glue {
    fn keyword(self) -> &'static str {
        match self {
            Glue::And => " AND ",
            Glue::Or => " OR ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Plain,
    Inner,
    Left,
    Right,
    Outer,
    LeftOuter,
    RightOuter,
}

impl JoinType {
    /// Parse a legacy join type string; unknown values fall back to a plain `JOIN`.
    #[must_use]
    pub fn from_legacy(kind: &str) -> Self {
        match kind.trim().to_ascii_uppercase().as_str() {
            "INNER" => JoinType::Inner,
            "LEFT" => JoinType::Left,
            "RIGHT" => JoinType::Right,
            "OUTER" => JoinType::Outer,
            "LEFT OUTER" => JoinType::LeftOuter,
            "RIGHT OUTER" => JoinType::RightOuter,
            _ => JoinType::Plain,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            JoinType::Plain => "JOIN",
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Outer => "OUTER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::RightOuter => "RIGHT OUTER JOIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// No explicit direction; the field may carry its own `ASC`/`DESC`.
    #[default]
    Unspecified,
    Asc,
    Desc,
    Random,
}

impl Direction {
    #[must_use]
    pub fn from_legacy(direction: &str) -> Self {
        match direction.trim().to_ascii_uppercase().as_str() {
            "ASC" => Direction::Asc,
            "DESC" => Direction::Desc,
            "RANDOM" => Direction::Random,
            _ => Direction::Unspecified,
        }
    }
}

/// Where `%` goes around a `LIKE` match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeSide {
    #[default]
    Both,
    Before,
    After,
    None,
}

impl LikeSide {
    #[must_use]
    pub fn from_legacy(side: &str) -> Self {
        match side.trim().to_ascii_lowercase().as_str() {
            "before" => LikeSide::Before,
            "after" => LikeSide::After,
            "none" => LikeSide::None,
            _ => LikeSide::Both,
        }
    }

    fn wrap(self, pattern: &str) -> String {
        match self {
            LikeSide::Both => format!("%{pattern}%"),
            LikeSide::Before => format!("%{pattern}"),
            LikeSide::After => format!("{pattern}%"),
            LikeSide::None => pattern.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Max,
    Min,
    Avg,
    Sum,
    Count,
}

impl Aggregate {
    fn function(self) -> &'static str {
        match self {
            Aggregate::Max => "MAX",
            Aggregate::Min => "MIN",
            Aggregate::Avg => "AVG",
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
        }
    }
}

/// Value side of a `set` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Bound as a parameter.
    Bind(RowValues),
    /// Written into the statement verbatim (e.g. `counter + 1`).
    Raw(String),
}

#[derive(Debug, Clone)]
enum Condition {
    Expr { glue: Glue, fragment: CompiledQuery },
    GroupStart { glue: Glue, not: bool },
    GroupEnd,
}

/// A builder bound to one table.
///
/// ```rust
/// use legacy_qb::builder::{Glue, TableBuilder};
///
/// let mut b = TableBuilder::new("users");
/// b.where_(Glue::And, "age >", 18.into(), None);
/// let sql = b.compile_select().unwrap().to_sql();
/// assert_eq!(sql, r#"SELECT * FROM "users" WHERE "age" > 18"#);
/// ```
#[derive(Debug, Clone)]
pub struct TableBuilder {
    table: String,
    from: Vec<String>,
    select: Vec<String>,
    distinct: bool,
    joins: Vec<String>,
    conditions: Vec<Condition>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    set: Vec<(String, SetValue)>,
}

fn protect_if(item: &str, escape: Option<bool>) -> String {
    if escape == Some(false) {
        item.trim().to_owned()
    } else {
        protect_identifiers(item)
    }
}

impl TableBuilder {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.trim().to_owned(),
            from: Vec::new(),
            select: Vec::new(),
            distinct: false,
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            set: Vec::new(),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Add select columns. A comma list is split unless it contains a function call.
    pub fn select(&mut self, columns: &str, escape: Option<bool>) -> &mut Self {
        if columns.contains('(') {
            self.select.push(columns.trim().to_owned());
            return self;
        }
        for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            self.select.push(protect_if(column, escape));
        }
        self
    }

    /// `MAX`/`MIN`/`AVG`/`SUM`/`COUNT` over one field. An empty alias uses the field name.
    pub fn select_agg(&mut self, func: Aggregate, field: &str, alias: &str) -> &mut Self {
        let field = field.trim();
        let alias = if alias.trim().is_empty() {
            field.rsplit('.').next().unwrap_or(field)
        } else {
            alias.trim()
        };
        self.select.push(format!(
            "{}({}) AS {}",
            func.function(),
            protect_identifiers(field),
            quote_identifier(alias)
        ));
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Add another table to the FROM list.
    pub fn from(&mut self, table: &str) -> &mut Self {
        for table in table.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            self.from.push(protect_identifiers(table));
        }
        self
    }

    pub fn join(
        &mut self,
        table: &str,
        cond: &str,
        kind: JoinType,
        escape: Option<bool>,
    ) -> &mut Self {
        let (table, cond) = if escape == Some(false) {
            (table.trim().to_owned(), cond.trim().to_owned())
        } else {
            (protect_identifiers(table), protect_condition(cond.trim()))
        };
        self.joins
            .push(format!("{} {table} ON {cond}", kind.keyword()));
        self
    }

    /// `key` may end with an operator (`"age >"`); NULL values become `IS [NOT] NULL`.
    pub fn where_(
        &mut self,
        glue: Glue,
        key: &str,
        value: RowValues,
        escape: Option<bool>,
    ) -> &mut Self {
        let (column, op) = split_operator(key);
        let mut fragment = CompiledQuery::text(protect_if(&column, escape));
        match (op.as_deref(), value) {
            (None | Some("=" | "IS"), RowValues::Null) => fragment.push_sql(" IS NULL"),
            (Some("!=" | "<>" | "IS NOT"), RowValues::Null) => fragment.push_sql(" IS NOT NULL"),
            (Some(op), RowValues::Null) => fragment.push_sql(&format!(" {op} NULL")),
            (op, value) => {
                fragment.push_sql(&format!(" {} ", op.unwrap_or("=")));
                fragment.push_bind(value);
            }
        }
        self.conditions.push(Condition::Expr { glue, fragment });
        self
    }

    /// A condition written verbatim.
    pub fn where_raw(&mut self, glue: Glue, sql: &str) -> &mut Self {
        self.conditions.push(Condition::Expr {
            glue,
            fragment: CompiledQuery::text(sql.trim()),
        });
        self
    }

    /// `IN` / `NOT IN`. An empty list matches nothing for `IN` and everything for `NOT IN`.
    pub fn where_in(
        &mut self,
        glue: Glue,
        not: bool,
        key: &str,
        values: &[RowValues],
        escape: Option<bool>,
    ) -> &mut Self {
        let fragment = if values.is_empty() {
            CompiledQuery::text(if not { "1 = 1" } else { "1 = 0" })
        } else {
            let mut fragment = CompiledQuery::text(protect_if(key, escape));
            fragment.push_sql(if not { " NOT IN (" } else { " IN (" });
            for (idx, value) in values.iter().enumerate() {
                if idx > 0 {
                    fragment.push_sql(", ");
                }
                fragment.push_bind(value.clone());
            }
            fragment.push_sql(")");
            fragment
        };
        self.conditions.push(Condition::Expr { glue, fragment });
        self
    }

    pub fn group_start(&mut self, glue: Glue, not: bool) -> &mut Self {
        self.conditions.push(Condition::GroupStart { glue, not });
        self
    }

    pub fn group_end(&mut self) -> &mut Self {
        self.conditions.push(Condition::GroupEnd);
        self
    }

    /// `LIKE` with wildcard escaping; `escape = Some(false)` leaves the match untouched.
    pub fn like(
        &mut self,
        glue: Glue,
        not: bool,
        field: &str,
        pattern: &str,
        side: LikeSide,
        escape: Option<bool>,
    ) -> &mut Self {
        let mut fragment = CompiledQuery::text(protect_if(field, escape));
        fragment.push_sql(if not { " NOT LIKE " } else { " LIKE " });
        if escape == Some(false) {
            fragment.push_bind(RowValues::Text(side.wrap(pattern)));
        } else {
            fragment.push_bind(RowValues::Text(side.wrap(&escape_like_wildcards(pattern))));
            fragment.push_sql(&format!(" ESCAPE '{LIKE_ESCAPE_CHAR}'"));
        }
        self.conditions.push(Condition::Expr { glue, fragment });
        self
    }

    pub fn group_by(&mut self, fields: &str, escape: Option<bool>) -> &mut Self {
        for field in fields.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            self.group_by.push(protect_if(field, escape));
        }
        self
    }

    /// Order by one field or a comma list; each item may carry its own `ASC`/`DESC`.
    pub fn order_by(&mut self, field: &str, direction: Direction, escape: Option<bool>) -> &mut Self {
        if direction == Direction::Random {
            self.order_by.push("RANDOM()".to_owned());
            return self;
        }
        for item in field.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let (name, inline) = split_direction(item);
            let dir = match direction {
                Direction::Asc => Some("ASC"),
                Direction::Desc => Some("DESC"),
                Direction::Unspecified | Direction::Random => inline,
            };
            let name = protect_if(name, escape);
            self.order_by.push(match dir {
                Some(dir) => format!("{name} {dir}"),
                None => name,
            });
        }
        self
    }

    /// `Some(0)` as limit means "no limit".
    pub fn limit(&mut self, limit: Option<u64>, offset: Option<u64>) -> &mut Self {
        if let Some(limit) = limit {
            self.limit = (limit > 0).then_some(limit);
        }
        if let Some(offset) = offset {
            self.offset = (offset > 0).then_some(offset);
        }
        self
    }

    pub fn set(&mut self, key: &str, value: SetValue, escape: Option<bool>) -> &mut Self {
        let column = protect_if(key, escape);
        if let Some(slot) = self.set.iter_mut().find(|(k, _)| *k == column) {
            slot.1 = value;
        } else {
            self.set.push((column, value));
        }
        self
    }
}

fn split_direction(item: &str) -> (&str, Option<&'static str>) {
    let upper = item.to_ascii_uppercase();
    if upper.ends_with(" DESC") {
        (item[..item.len() - 5].trim_end(), Some("DESC"))
    } else if upper.ends_with(" ASC") {
        (item[..item.len() - 4].trim_end(), Some("ASC"))
    } else {
        (item, None)
    }
}

use crate::builder::{Aggregate, Direction, Glue, JoinType, LikeSide, SetValue, TableBuilder};
use crate::types::RowValues;

/// One recorded clause call, replayed onto a [`TableBuilder`] at the next
/// terminal operation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingClause {
    Select {
        columns: String,
        escape: Option<bool>,
    },
    SelectAgg {
        func: Aggregate,
        field: String,
        alias: String,
    },
    From(String),
    Join {
        table: String,
        cond: String,
        kind: JoinType,
        escape: Option<bool>,
    },
    Where {
        glue: Glue,
        key: String,
        value: RowValues,
        escape: Option<bool>,
    },
    WhereRaw {
        glue: Glue,
        sql: String,
    },
    WhereIn {
        glue: Glue,
        not: bool,
        key: String,
        values: Vec<RowValues>,
        escape: Option<bool>,
    },
    GroupStart {
        glue: Glue,
        not: bool,
    },
    GroupEnd,
    Like {
        glue: Glue,
        not: bool,
        field: String,
        pattern: String,
        side: LikeSide,
        escape: Option<bool>,
    },
    GroupBy {
        fields: String,
        escape: Option<bool>,
    },
    OrderBy {
        field: String,
        direction: Direction,
        escape: Option<bool>,
    },
    Set {
        key: String,
        value: SetValue,
        escape: Option<bool>,
    },
}

impl PendingClause {
    pub(crate) fn apply(&self, builder: &mut TableBuilder) {
        match self {
            PendingClause::Select { columns, escape } => {
                builder.select(columns, *escape);
            }
            PendingClause::SelectAgg { func, field, alias } => {
                builder.select_agg(*func, field, alias);
            }
            PendingClause::From(table) => {
                builder.from(table);
            }
            PendingClause::Join {
                table,
                cond,
                kind,
                escape,
            } => {
                builder.join(table, cond, *kind, *escape);
            }
            PendingClause::Where {
                glue,
                key,
                value,
                escape,
            } => {
                builder.where_(*glue, key, value.clone(), *escape);
            }
            PendingClause::WhereRaw { glue, sql } => {
                builder.where_raw(*glue, sql);
            }
            PendingClause::WhereIn {
                glue,
                not,
                key,
                values,
                escape,
            } => {
                builder.where_in(*glue, *not, key, values, *escape);
            }
            PendingClause::GroupStart { glue, not } => {
                builder.group_start(*glue, *not);
            }
            PendingClause::GroupEnd => {
                builder.group_end();
            }
            PendingClause::Like {
                glue,
                not,
                field,
                pattern,
                side,
                escape,
            } => {
                builder.like(*glue, *not, field, pattern, *side, *escape);
            }
            PendingClause::GroupBy { fields, escape } => {
                builder.group_by(fields, *escape);
            }
            PendingClause::OrderBy {
                field,
                direction,
                escape,
            } => {
                builder.order_by(field, *direction, *escape);
            }
            PendingClause::Set { key, value, escape } => {
                builder.set(key, value.clone(), *escape);
            }
        }
    }
}

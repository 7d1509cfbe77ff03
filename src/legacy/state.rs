use super::clause::PendingClause;
use crate::builder::TableBuilder;
use crate::error::BridgeError;

/// Which terminal operation a replay is for; decides the phases that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Select,
    Count,
    Insert,
    Update,
    Delete,
}

/// Clause calls recorded since the last terminal operation.
///
/// `builder` is the pristine builder bound to the current table. Replays clone
/// it, so a state kept across terminal calls never applies a clause twice.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryBuilderState {
    builder: Option<TableBuilder>,
    select: Vec<PendingClause>,
    select_agg: Vec<PendingClause>,
    from: Vec<PendingClause>,
    join: Vec<PendingClause>,
    // where, or_where, where_in variants and group markers, in call order
    condition: Vec<PendingClause>,
    like: Vec<PendingClause>,
    group_by: Vec<PendingClause>,
    order_by: Vec<PendingClause>,
    set: Vec<PendingClause>,
    distinct: bool,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryBuilderState {
    /// Bind `table`, or keep the current binding when `table` is empty.
    ///
    /// # Errors
    /// `Precondition` when `table` is empty and nothing is bound yet.
    pub(crate) fn ensure_bound(&mut self, table: &str) -> Result<(), BridgeError> {
        if !table.trim().is_empty() {
            self.builder = Some(TableBuilder::new(table));
            return Ok(());
        }
        if self.builder.is_none() {
            return Err(BridgeError::Precondition(
                "no table bound: call from() or pass a table to the terminal method".into(),
            ));
        }
        Ok(())
    }

    /// The first `from` binds the builder; later ones add FROM tables.
    pub(crate) fn push_from(&mut self, table: &str) {
        if self.builder.is_none() {
            self.builder = Some(TableBuilder::new(table));
        } else {
            self.from.push(PendingClause::From(table.to_owned()));
        }
    }

    pub(crate) fn push_select(&mut self, clause: PendingClause) {
        self.select.push(clause);
    }

    pub(crate) fn push_select_agg(&mut self, clause: PendingClause) {
        self.select_agg.push(clause);
    }

    pub(crate) fn push_join(&mut self, clause: PendingClause) {
        self.join.push(clause);
    }

    pub(crate) fn push_condition(&mut self, clause: PendingClause) {
        self.condition.push(clause);
    }

    pub(crate) fn push_like(&mut self, clause: PendingClause) {
        self.like.push(clause);
    }

    pub(crate) fn push_group_by(&mut self, clause: PendingClause) {
        self.group_by.push(clause);
    }

    pub(crate) fn push_order_by(&mut self, clause: PendingClause) {
        self.order_by.push(clause);
    }

    pub(crate) fn push_set(&mut self, clause: PendingClause) {
        self.set.push(clause);
    }

    pub(crate) fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    pub(crate) fn set_limit(&mut self, limit: Option<u64>, offset: Option<u64>) {
        if limit.is_some() {
            self.limit = limit;
        }
        if offset.is_some() {
            self.offset = offset;
        }
    }

    /// A clone of the bound builder with no clauses applied.
    pub(crate) fn pristine(&self) -> Result<TableBuilder, BridgeError> {
        self.builder.clone().ok_or_else(|| {
            BridgeError::Precondition("no table bound for the query builder".into())
        })
    }

    /// Replay the recorded clauses for `flow` in phase order.
    pub(crate) fn replay(&self, flow: Flow) -> Result<TableBuilder, BridgeError> {
        let mut builder = self.pristine()?;
        let apply = |builder: &mut TableBuilder, clauses: &[PendingClause]| {
            for clause in clauses {
                clause.apply(builder);
            }
        };
        match flow {
            Flow::Select | Flow::Count => {
                apply(&mut builder, &self.select);
                apply(&mut builder, &self.select_agg);
                builder.distinct(self.distinct);
                apply(&mut builder, &self.from);
                apply(&mut builder, &self.join);
                apply(&mut builder, &self.condition);
                apply(&mut builder, &self.like);
                apply(&mut builder, &self.group_by);
                if flow == Flow::Select {
                    apply(&mut builder, &self.order_by);
                    builder.limit(self.limit, self.offset);
                }
            }
            Flow::Insert => apply(&mut builder, &self.set),
            Flow::Update => {
                apply(&mut builder, &self.set);
                apply(&mut builder, &self.join);
                apply(&mut builder, &self.condition);
                apply(&mut builder, &self.like);
                apply(&mut builder, &self.group_by);
                builder.limit(self.limit, None);
            }
            Flow::Delete => {
                apply(&mut builder, &self.condition);
                apply(&mut builder, &self.like);
                apply(&mut builder, &self.group_by);
                builder.limit(self.limit, None);
            }
        }
        Ok(builder)
    }

    /// Drop every recorded clause and the table binding.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn is_clean(&self) -> bool {
        self.builder.is_none()
            && self.select.is_empty()
            && self.select_agg.is_empty()
            && self.from.is_empty()
            && self.join.is_empty()
            && self.condition.is_empty()
            && self.like.is_empty()
            && self.group_by.is_empty()
            && self.order_by.is_empty()
            && self.set.is_empty()
            && !self.distinct
            && self.limit.is_none()
            && self.offset.is_none()
    }
}

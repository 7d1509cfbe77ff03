use serde_json::{Map, Value as JsonValue};

use super::{CustomDbRow, ResultSet};

/// Legacy result wrapper returned by `get`, `get_where` and read-type `query` calls.
///
/// Keeps a row cursor so `next_row`/`previous_row` behave like the legacy API:
/// moving past either end leaves the cursor on the boundary row.
#[derive(Debug, Clone, Default)]
pub struct DbResult {
    set: ResultSet,
    current_row: usize,
}

impl DbResult {
    #[must_use]
    pub fn new(set: ResultSet) -> Self {
        Self {
            set,
            current_row: 0,
        }
    }

    /// All rows.
    #[must_use]
    pub fn result(&self) -> &[CustomDbRow] {
        &self.set.results
    }

    /// All rows as column-ordered JSON objects.
    #[must_use]
    pub fn result_array(&self) -> Vec<Map<String, JsonValue>> {
        self.set.results.iter().map(CustomDbRow::to_json_map).collect()
    }

    /// Row `n`, moving the cursor there. `None` when `n` is out of range.
    pub fn row(&mut self, n: usize) -> Option<&CustomDbRow> {
        if n >= self.set.results.len() {
            return None;
        }
        self.current_row = n;
        self.set.results.get(n)
    }

    /// Row `n` as a JSON object.
    pub fn row_array(&mut self, n: usize) -> Option<Map<String, JsonValue>> {
        self.row(n).map(CustomDbRow::to_json_map)
    }

    pub fn first_row(&mut self) -> Option<&CustomDbRow> {
        self.row(0)
    }

    pub fn last_row(&mut self) -> Option<&CustomDbRow> {
        let last = self.set.results.len().checked_sub(1)?;
        self.row(last)
    }

    pub fn next_row(&mut self) -> Option<&CustomDbRow> {
        if self.set.results.is_empty() {
            return None;
        }
        if self.current_row + 1 < self.set.results.len() {
            self.current_row += 1;
        }
        self.set.results.get(self.current_row)
    }

    pub fn previous_row(&mut self) -> Option<&CustomDbRow> {
        if self.set.results.is_empty() {
            return None;
        }
        self.current_row = self.current_row.saturating_sub(1);
        self.set.results.get(self.current_row)
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.set.results.len()
    }

    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.set.get_column_names().map_or(0, |names| names.len())
    }

    #[must_use]
    pub fn list_fields(&self) -> Vec<String> {
        self.set
            .get_column_names()
            .map(|names| names.as_ref().clone())
            .unwrap_or_default()
    }

    /// Release the rows and hand back the raw backend result set.
    #[must_use]
    pub fn free_result(self) -> ResultSet {
        self.set
    }
}

impl From<ResultSet> for DbResult {
    fn from(set: ResultSet) -> Self {
        Self::new(set)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::RowValues;

    fn sample() -> DbResult {
        let mut set = ResultSet::with_capacity(3);
        set.set_column_names(Arc::new(vec!["id".into(), "name".into()]));
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            set.add_row_values(vec![RowValues::Int(id), RowValues::Text(name.into())]);
        }
        DbResult::new(set)
    }

    #[test]
    fn cursor_stays_on_boundaries() {
        let mut res = sample();
        assert_eq!(res.previous_row().unwrap().get("id"), Some(&RowValues::Int(1)));
        res.last_row();
        assert_eq!(res.next_row().unwrap().get("id"), Some(&RowValues::Int(3)));
        assert_eq!(res.previous_row().unwrap().get("id"), Some(&RowValues::Int(2)));
    }

    #[test]
    fn out_of_range_row_is_none() {
        let mut res = sample();
        assert!(res.row(7).is_none());
        assert_eq!(res.num_rows(), 3);
        assert_eq!(res.num_fields(), 2);
        assert_eq!(res.list_fields(), vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn row_array_is_column_ordered() {
        let mut res = sample();
        let row = res.row_array(1).unwrap();
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, ["id", "name"]);
        assert_eq!(row["name"], JsonValue::from("b"));
    }

    #[test]
    fn empty_result_has_no_rows() {
        let mut res = DbResult::default();
        assert!(res.first_row().is_none());
        assert!(res.last_row().is_none());
        assert!(res.next_row().is_none());
        assert!(res.result_array().is_empty());
    }
}

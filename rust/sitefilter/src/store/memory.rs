//! In-memory property store.
//!
//! Evaluates the same predicate IR the PostgreSQL store renders to SQL, with
//! SQL-comparable semantics: a row whose column is NULL (or absent) fails
//! numeric comparisons, array containment is exact, substring matching is
//! case-insensitive. Unknown columns surface as `ColumnNotFound` so schema
//! drift handling can be exercised without a database. Backs the test suite
//! and local development.

use crate::{
    pagination::PageWindow,
    predicate::Predicate,
    store::{PropertyStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    columns: BTreeSet<String>,
    rows: Vec<Value>,
}

impl MemoryStore {
    /// Builds a store whose column set is the union of keys across the rows.
    pub fn new(rows: Vec<Value>) -> Self {
        let columns = rows
            .iter()
            .filter_map(Value::as_object)
            .flat_map(|row| row.keys().cloned())
            .collect();
        Self { columns, rows }
    }

    /// Builds a store with an explicit column set, for simulating a table
    /// that has drifted away from what the filters expect.
    pub fn with_columns<I, S>(rows: Vec<Value>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    fn ensure_known(&self, column: &str) -> StoreResult<()> {
        if self.columns.contains(column) {
            Ok(())
        } else {
            Err(StoreError::ColumnNotFound)
        }
    }

    fn matching_rows(&self, predicates: &[Predicate]) -> StoreResult<Vec<&Value>> {
        for predicate in predicates {
            self.ensure_known(predicate.column())?;
        }

        Ok(self
            .rows
            .iter()
            .filter(|row| predicates.iter().all(|predicate| matches(row, predicate)))
            .collect())
    }
}

#[async_trait]
impl PropertyStore for MemoryStore {
    async fn count(&self, predicates: &[Predicate]) -> StoreResult<i64> {
        Ok(self.matching_rows(predicates)?.len() as i64)
    }

    async fn fetch(
        &self,
        projection: &[&str],
        predicates: &[Predicate],
        window: Option<PageWindow>,
    ) -> StoreResult<Vec<Value>> {
        for column in projection {
            self.ensure_known(column)?;
        }

        let matched = self.matching_rows(predicates)?;
        let (skip, take) = match window {
            Some(window) => (window.offset() as usize, window.limit() as usize),
            None => (0, usize::MAX),
        };

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|row| project(row, projection))
            .collect())
    }
}

fn project(row: &Value, projection: &[&str]) -> Value {
    let source = row.as_object();
    let mut projected = Map::new();
    for column in projection {
        let value = source
            .and_then(|fields| fields.get(*column))
            .cloned()
            .unwrap_or(Value::Null);
        projected.insert((*column).to_string(), value);
    }
    Value::Object(projected)
}

fn matches(row: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Gte { column, value } => number_at(row, column).is_some_and(|n| n >= *value),
        Predicate::Lte { column, value } => number_at(row, column).is_some_and(|n| n <= *value),
        Predicate::NeNumber { column, value } => {
            number_at(row, column).is_some_and(|n| n != *value)
        }
        Predicate::Eq { column, value } => string_at(row, column).is_some_and(|s| s == value),
        Predicate::EqAny { column, values } => {
            string_at(row, column).is_some_and(|s| values.iter().any(|value| value == s))
        }
        Predicate::IlikeContains { column, needle } => string_at(row, column)
            .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
        Predicate::ContainsAll { column, values } => {
            let Some(items) = array_at(row, column) else {
                return false;
            };
            values.iter().all(|value| items.contains(value))
        }
        Predicate::Overlaps { column, values } => {
            let Some(items) = array_at(row, column) else {
                return false;
            };
            values.iter().any(|value| items.contains(value))
        }
    }
}

fn number_at(row: &Value, column: &str) -> Option<f64> {
    row.get(column).and_then(Value::as_f64)
}

fn string_at<'a>(row: &'a Value, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn array_at(row: &Value, column: &str) -> Option<Vec<String>> {
    row.get(column).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

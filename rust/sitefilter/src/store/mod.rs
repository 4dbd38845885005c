//! Abstract query capability over the property-listing table.
//!
//! The engine never talks SQL directly; it hands a predicate list to a
//! `PropertyStore` and gets counts or projected rows back. The one error
//! class the engine special-cases is `ColumnNotFound` (a filter or the
//! projection referencing a column the table no longer has), which every
//! implementation must report as its own variant rather than a generic
//! failure.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::{pagination::PageWindow, predicate::Predicate};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced column/field does not exist in the table (schema drift).
    #[error("referenced column does not exist")]
    ColumnNotFound,

    #[error("store error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Exact row count under the given conjunction of predicates.
    async fn count(&self, predicates: &[Predicate]) -> StoreResult<i64>;

    /// Projected rows under the given predicates, optionally limited to a
    /// row window. Rows come back as JSON objects keyed by column name.
    async fn fetch(
        &self,
        projection: &[&str],
        predicates: &[Predicate],
        window: Option<PageWindow>,
    ) -> StoreResult<Vec<Value>>;
}

//! PostgreSQL implementation of the property store.
//!
//! Filter columns are admin-configured at runtime, so queries are rendered
//! from the predicate IR as parameterized SQL with quoted identifiers rather
//! than through a compile-time table DSL. Rows come back through
//! `row_to_json` so the dynamic projection needs no per-column type mapping.

use crate::{
    db::PgPool,
    pagination::PageWindow,
    predicate::Predicate,
    store::{PropertyStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::{error::SqlState, types::ToSql};
use tracing::error;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    table: String,
}

#[derive(Debug, Clone)]
enum BindParam {
    Text(String),
    TextArray(Vec<String>),
    Float(f64),
    Int(i64),
}

impl PgStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    async fn client(&self) -> StoreResult<bb8::PooledConnection<'_, crate::db::PgConnectionManager>> {
        self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to acquire database connection");
            StoreError::Backend(anyhow::anyhow!("failed to acquire database connection: {err:?}"))
        })
    }
}

#[async_trait]
impl PropertyStore for PgStore {
    async fn count(&self, predicates: &[Predicate]) -> StoreResult<i64> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT count(*) FROM {}{}",
            quote_ident(&self.table),
            render_where(predicates, &mut params)
        );

        let client = self.client().await?;
        let row = client
            .query_one(&sql, &as_sql_params(&params))
            .await
            .map_err(classify)?;
        Ok(row.get(0))
    }

    async fn fetch(
        &self,
        projection: &[&str],
        predicates: &[Predicate],
        window: Option<PageWindow>,
    ) -> StoreResult<Vec<Value>> {
        let mut params = Vec::new();
        let columns = projection
            .iter()
            .map(|column| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");

        let mut inner = format!(
            "SELECT {} FROM {}{}",
            columns,
            quote_ident(&self.table),
            render_where(predicates, &mut params)
        );
        if let Some(window) = window {
            params.push(BindParam::Int(window.limit()));
            inner.push_str(&format!(" LIMIT ${}", params.len()));
            params.push(BindParam::Int(window.offset()));
            inner.push_str(&format!(" OFFSET ${}", params.len()));
        }
        let sql = format!("SELECT row_to_json(sub) FROM ({inner}) AS sub");

        let client = self.client().await?;
        let rows = client
            .query(&sql, &as_sql_params(&params))
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(|row| row.get::<_, Value>(0)).collect())
    }
}

/// Maps an execution failure to the store error taxonomy. Schema drift is
/// recognized by SQLSTATE 42703, not by sniffing the error message.
fn classify(err: tokio_postgres::Error) -> StoreError {
    if err.code() == Some(&SqlState::UNDEFINED_COLUMN) {
        StoreError::ColumnNotFound
    } else {
        StoreError::Backend(err.into())
    }
}

fn render_where(predicates: &[Predicate], params: &mut Vec<BindParam>) -> String {
    if predicates.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = predicates
        .iter()
        .map(|predicate| render_predicate(predicate, params))
        .collect();
    format!(" WHERE {}", clauses.join(" AND "))
}

fn render_predicate(predicate: &Predicate, params: &mut Vec<BindParam>) -> String {
    match predicate {
        Predicate::Gte { column, value } => {
            params.push(BindParam::Float(*value));
            format!("{} >= ${}", quote_ident(column), params.len())
        }
        Predicate::Lte { column, value } => {
            params.push(BindParam::Float(*value));
            format!("{} <= ${}", quote_ident(column), params.len())
        }
        Predicate::NeNumber { column, value } => {
            params.push(BindParam::Float(*value));
            format!("{} <> ${}", quote_ident(column), params.len())
        }
        Predicate::Eq { column, value } => {
            params.push(BindParam::Text(value.clone()));
            format!("{} = ${}", quote_ident(column), params.len())
        }
        Predicate::EqAny { column, values } => {
            params.push(BindParam::TextArray(values.clone()));
            format!("{} = ANY(${})", quote_ident(column), params.len())
        }
        Predicate::IlikeContains { column, needle } => {
            params.push(BindParam::Text(format!("%{}%", escape_like(needle))));
            format!("{} ILIKE ${}", quote_ident(column), params.len())
        }
        Predicate::ContainsAll { column, values } => {
            params.push(BindParam::TextArray(values.clone()));
            format!(
                "coalesce({}, ARRAY[]::text[]) @> ${}",
                quote_ident(column),
                params.len()
            )
        }
        Predicate::Overlaps { column, values } => {
            params.push(BindParam::TextArray(values.clone()));
            format!(
                "coalesce({}, ARRAY[]::text[]) && ${}",
                quote_ident(column),
                params.len()
            )
        }
    }
}

fn as_sql_params(params: &[BindParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| match param {
            BindParam::Text(value) => value as &(dyn ToSql + Sync),
            BindParam::TextArray(value) => value as &(dyn ToSql + Sync),
            BindParam::Float(value) => value as &(dyn ToSql + Sync),
            BindParam::Int(value) => value as &(dyn ToSql + Sync),
        })
        .collect()
}

fn quote_ident(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Escapes LIKE metacharacters so user values only ever match literally.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn max_dollar_placeholder(sql: &str) -> usize {
        let bytes = sql.as_bytes();
        let mut max = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            if bytes[i] != b'$' {
                i += 1;
                continue;
            }

            i += 1;
            let mut value = 0usize;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                value = value * 10 + (bytes[i] - b'0') as usize;
                i += 1;
            }
            max = max.max(value);
        }

        max
    }

    #[test]
    fn where_clause_renders_conjunction_with_sequential_binds() {
        let predicates = vec![
            Predicate::Eq {
                column: "category".into(),
                value: "for-sale".into(),
            },
            Predicate::Gte {
                column: "asking_price".into(),
                value: 100_000.0,
            },
            Predicate::Overlaps {
                column: "zones".into(),
                values: vec!["Z1".into(), "Z2".into()],
            },
        ];

        let mut params = Vec::new();
        let clause = render_where(&predicates, &mut params);

        assert_eq!(
            clause,
            " WHERE \"category\" = $1 AND \"asking_price\" >= $2 \
             AND coalesce(\"zones\", ARRAY[]::text[]) && $3"
        );
        assert_eq!(max_dollar_placeholder(&clause), params.len());
    }

    #[test]
    fn empty_predicates_render_no_where_clause() {
        let mut params = Vec::new();
        assert_eq!(render_where(&[], &mut params), "");
        assert!(params.is_empty());
    }

    #[test]
    fn ilike_needle_is_escaped_and_wrapped() {
        let mut params = Vec::new();
        let clause = render_predicate(
            &Predicate::IlikeContains {
                column: "address".into(),
                needle: "100% George_St".into(),
            },
            &mut params,
        );

        assert_eq!(clause, "\"address\" ILIKE $1");
        match &params[0] {
            BindParam::Text(pattern) => assert_eq!(pattern, "%100\\% George\\_St%"),
            other => panic!("expected text bind, got {other:?}"),
        }
    }

    #[test]
    fn identifiers_are_quoted_against_injection() {
        assert_eq!(quote_ident("zones"), "\"zones\"");
        assert_eq!(
            quote_ident("bad\"; drop table properties; --"),
            "\"bad\"\"; drop table properties; --\""
        );
    }
}

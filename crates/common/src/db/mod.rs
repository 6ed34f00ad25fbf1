//! Row store layer
//!
//! Provides:
//! - Untyped column values (`Cell`) and positional rows (`RawRow`)
//! - The `RowStore` seam used by the repository
//! - A pooled Postgres implementation (`DbPool`)
//! - An in-memory implementation for tests (`MemoryStore`, behind `test-util`)
//! - Positional row mapping into typed row records

#[cfg(any(test, feature = "test-util"))]
mod memory;
pub mod queries;
mod repository;
pub mod rows;

#[cfg(any(test, feature = "test-util"))]
pub use memory::{MemoryStore, RecordedCall};
pub use queries::Query;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Row, TypeInfo, ValueRef};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A single untyped column value as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

/// One result row, columns in select-list order
pub type RawRow = Vec<Cell>;

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Short type label used in mapping errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Timestamp(_) => "timestamp",
            Cell::Date(_) => "date",
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<DateTime<Utc>> for Cell {
    fn from(value: DateTime<Utc>) -> Self {
        Cell::Timestamp(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// Executes parameterized read queries against the relational backend.
///
/// Failures surface immediately as `StoreUnavailable` (connection level)
/// or `Query` (everything else); there is no retry at this layer.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Run a query and return its rows in store order
    async fn fetch_rows(&self, query: &Query, params: &[Cell]) -> Result<Vec<RawRow>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Postgres connection pool
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Create a lazily connecting pool from configuration.
    ///
    /// No connection is opened until the first query, so the service can
    /// start while the database is still unreachable.
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config.connection_url()?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .connect_lazy(&url)
            .map_err(|e| AppError::Configuration {
                message: format!("Invalid database URL: {}", e),
            })?;

        info!(
            max_connections = config.max_connections,
            "Database pool configured"
        );

        Ok(Self { pool })
    }
}

#[async_trait]
impl RowStore for DbPool {
    async fn fetch_rows(&self, query: &Query, params: &[Cell]) -> Result<Vec<RawRow>> {
        let start = Instant::now();

        let mut statement = sqlx::query(query.sql);
        for param in params {
            statement = bind_cell(statement, param);
        }

        let result = statement.fetch_all(&self.pool).await;
        metrics::record_store_query(query.name, start.elapsed().as_secs_f64(), result.is_ok());

        let rows = result.map_err(|e| {
            let err = AppError::from(e);
            warn!(query = query.name, error = %err, "Row store query failed");
            err
        })?;

        debug!(query = query.name, rows = rows.len(), "Row store query complete");

        rows.iter().map(decode_row).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

fn bind_cell<'q>(statement: PgQuery<'q>, cell: &Cell) -> PgQuery<'q> {
    match cell {
        Cell::Null => statement.bind(Option::<String>::None),
        Cell::Bool(v) => statement.bind(*v),
        Cell::Int(v) => statement.bind(*v),
        Cell::Float(v) => statement.bind(*v),
        Cell::Text(v) => statement.bind(v.clone()),
        Cell::Timestamp(v) => statement.bind(*v),
        Cell::Date(v) => statement.bind(*v),
    }
}

fn decode_row(row: &PgRow) -> Result<RawRow> {
    (0..row.len()).map(|index| decode_cell(row, index)).collect()
}

fn decode_cell(row: &PgRow, index: usize) -> Result<Cell> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Cell::Null);
        }
        raw.type_info().name().to_string()
    };

    let cell = match type_name.as_str() {
        "BOOL" => Cell::Bool(row.try_get(index)?),
        "INT2" => Cell::Int(row.try_get::<i16, _>(index)?.into()),
        "INT4" => Cell::Int(row.try_get::<i32, _>(index)?.into()),
        "INT8" => Cell::Int(row.try_get(index)?),
        "FLOAT4" => Cell::Float(row.try_get::<f32, _>(index)?.into()),
        "FLOAT8" => Cell::Float(row.try_get(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Cell::Text(row.try_get(index)?),
        "TIMESTAMPTZ" => Cell::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "TIMESTAMP" => Cell::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc()),
        "DATE" => Cell::Date(row.try_get(index)?),
        other => {
            return Err(AppError::Query {
                message: format!("unsupported column type {} at position {}", other, index),
            })
        }
    };

    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_into_cell() {
        assert_eq!(Cell::from(Some(3_i64)), Cell::Int(3));
        assert_eq!(Cell::from(Option::<String>::None), Cell::Null);
        assert!(Cell::from(Option::<&str>::None).is_null());
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Cell::Text("x".into()).type_name(), "text");
        assert_eq!(Cell::Int(1).type_name(), "int");
        assert_eq!(Cell::Null.type_name(), "null");
    }
}

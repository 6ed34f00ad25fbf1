//! In-memory row store
//!
//! Serves canned rows keyed by query name and bound parameters. Every call
//! is recorded so callers can assert how often the store was hit, and the
//! store can be switched off to simulate an outage.

use super::{Cell, Query, RawRow, RowStore};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One query issued against the store
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub query: &'static str,
    pub params: Vec<Cell>,
}

struct Fixture {
    query: &'static str,
    params: Vec<Cell>,
    rows: Vec<RawRow>,
}

pub struct MemoryStore {
    fixtures: Mutex<Vec<Fixture>>,
    calls: Mutex<Vec<RecordedCall>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            fixtures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Builder form of [`MemoryStore::insert`]
    pub fn with_rows(self, query: Query, params: Vec<Cell>, rows: Vec<RawRow>) -> Self {
        self.insert(query, params, rows);
        self
    }

    /// Register (or replace) the rows returned for `query` with `params`.
    /// Unregistered queries answer with no rows.
    pub fn insert(&self, query: Query, params: Vec<Cell>, rows: Vec<RawRow>) {
        let mut fixtures = lock(&self.fixtures);
        fixtures.retain(|f| !(f.query == query.name && f.params == params));
        fixtures.push(Fixture {
            query: query.name,
            params,
            rows,
        });
    }

    /// Toggle simulated availability
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Total number of queries issued so far
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of times a particular query was issued
    pub fn calls_to(&self, query: Query) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.query == query.name)
            .count()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn fetch_rows(&self, query: &Query, params: &[Cell]) -> Result<Vec<RawRow>> {
        lock(&self.calls).push(RecordedCall {
            query: query.name,
            params: params.to_vec(),
        });

        if !self.available.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable {
                message: format!("memory store offline ({})", query.name),
            });
        }

        let rows = lock(&self.fixtures)
            .iter()
            .find(|f| f.query == query.name && f.params.as_slice() == params)
            .map(|f| f.rows.clone())
            .unwrap_or_default();

        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::StoreUnavailable {
                message: "memory store offline".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queries;

    #[tokio::test]
    async fn test_returns_registered_rows_and_records_calls() {
        let store = MemoryStore::new().with_rows(
            queries::DIGEST_BY_ID,
            vec![Cell::Int(1)],
            vec![vec![Cell::Int(1), Cell::Text("2024-05-01T00:00:00Z".into()), Cell::Text("READY".into())]],
        );

        let rows = store.fetch_rows(&queries::DIGEST_BY_ID, &[Cell::Int(1)]).await.unwrap();
        assert_eq!(rows.len(), 1);

        let rows = store.fetch_rows(&queries::DIGEST_BY_ID, &[Cell::Int(2)]).await.unwrap();
        assert!(rows.is_empty());

        assert_eq!(store.call_count(), 2);
        assert_eq!(store.calls_to(queries::DIGEST_BY_ID), 2);
        assert_eq!(store.calls()[1].params, vec![Cell::Int(2)]);
    }

    #[tokio::test]
    async fn test_offline_store_fails_and_still_counts() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = store.fetch_rows(&queries::STORY_BY_ID, &[Cell::Int(5)]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.ping().await.is_err());
        assert_eq!(store.call_count(), 1);

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[test]
    fn test_insert_replaces_existing_fixture() {
        let store = MemoryStore::new();
        store.insert(queries::STORY_BY_ID, vec![Cell::Int(1)], vec![vec![Cell::Int(1)]]);
        store.insert(queries::STORY_BY_ID, vec![Cell::Int(1)], vec![]);
        assert_eq!(lock(&store.fixtures).len(), 1);
    }
}

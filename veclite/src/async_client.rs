//! Async facade (gated by the `async` feature): wraps the synchronous
//! `Client` in `tokio::task::spawn_blocking` calls so callers on an
//! async runtime don't block their executor on SQLite I/O.
//!
//! The core stays synchronous throughout — this module only exists at
//! the boundary, mirroring how a sync database driver is usually given
//! an async wrapper rather than rewritten top to bottom.

use crate::client::Client;
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::schema::{Schema, ViewDescriptor};
use crate::value::Row;
use std::path::PathBuf;
use std::sync::Arc;

/// Async wrapper over [`Client`]. Cheap to clone: the inner client is
/// shared behind an `Arc` and accessed from whichever blocking thread
/// `spawn_blocking` schedules the call onto.
#[derive(Clone)]
pub struct AsyncClient {
    inner: Arc<Client>,
}

impl AsyncClient {
    pub async fn create(dir: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let dir = dir.into();
        let client = run_blocking(move || Client::create(dir, schema)).await?;
        Ok(AsyncClient { inner: Arc::new(client) })
    }

    pub async fn open(dir: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        let dir = dir.into();
        let client = run_blocking(move || Client::open(dir, schema)).await?;
        Ok(AsyncClient { inner: Arc::new(client) })
    }

    /// Registration still requires exclusive access to the inner
    /// client (it mutates the embedder registry), so it's only
    /// reachable before the client is shared — call it right after
    /// `create`/`open`, before cloning.
    pub fn register_embedder(&mut self, name: &str, embedder: Box<dyn Embedder>) -> Result<()> {
        Arc::get_mut(&mut self.inner)
            .ok_or_else(|| Error::StorageError("AsyncClient is shared; register embedders before cloning".into()))?
            .register_embedder(name, embedder);
        Ok(())
    }

    pub fn register_view(&mut self, view: ViewDescriptor) -> Result<()> {
        Arc::get_mut(&mut self.inner)
            .ok_or_else(|| Error::StorageError("AsyncClient is shared; register views before cloning".into()))?
            .register_view(view)
    }

    pub async fn keyword_search(&self, table: &str, column_query: (String, usize)) -> Result<Vec<crate::planner::SearchHit>> {
        let inner = self.inner.clone();
        let table = table.to_string();
        let (query, limit) = column_query;
        run_blocking(move || inner.table(&table)?.keyword_search(&query, limit)).await
    }

    pub async fn insert(&self, table: &str, row: Row) -> Result<i64> {
        let inner = self.inner.clone();
        let table = table.to_string();
        run_blocking(move || inner.table(&table)?.insert(row)).await
    }

    pub async fn batch_embeddings(
        &self,
        table: &str,
        column: &str,
        items: Vec<(i64, String)>,
        atomic: bool,
    ) -> Result<usize> {
        let inner = self.inner.clone();
        let table = table.to_string();
        let column = column.to_string();
        run_blocking(move || {
            let batch_items: Vec<crate::batch::BatchItem<'_>> = items
                .iter()
                .map(|(row_id, text)| crate::batch::BatchItem { row_id: *row_id, text })
                .collect();
            inner.batch_embeddings(&table, &column, &batch_items, atomic)
        })
        .await
    }
}

async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|_| Error::Cancelled)?
}

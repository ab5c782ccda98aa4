//! The top-level `Client`: owns the relational store, the
//! vector files, the embedder registry, and the view resolver, and
//! hands out [`crate::table::TableHandle`]s for the public query
//! surface.

use crate::batch::{BatchCoordinator, BatchItem};
use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::schema::{Schema, ViewDescriptor};
use crate::store::RelStore;
use crate::table::TableHandle;
use crate::vector::VectorFile;
use crate::view::ViewResolver;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct Client {
    store: RelStore,
    schema: Schema,
    vectors: HashMap<(String, String), VectorFile>,
    embedders: HashMap<String, Box<dyn Embedder>>,
    views: ViewResolver,
    data_dir: PathBuf,
}

impl Client {
    /// Create a fresh database at `dir`, issuing schema DDL and
    /// opening a `VectorFile` for every vector-bearing column.
    pub fn create(dir: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let store = RelStore::open(dir.join("data.sqlite"))?;
        store.create_schema(&schema)?;
        let vectors = Self::open_vector_files(&dir, &schema)?;
        Ok(Client {
            store,
            schema,
            vectors,
            embedders: HashMap::new(),
            views: ViewResolver::new(),
            data_dir: dir,
        })
    }

    /// Open an existing database at `dir`. Re-issues schema DDL (a
    /// no-op for tables that already exist) and runs batch-intent-log
    /// reconciliation for every vector column, so a process that
    /// crashed mid-batch leaves a consistent store on the next open.
    pub fn open(dir: impl AsRef<Path>, schema: Schema) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let store = RelStore::open(dir.join("data.sqlite"))?;
        store.create_schema(&schema)?;
        let vectors = Self::open_vector_files(&dir, &schema)?;

        let client = Client {
            store,
            schema,
            vectors,
            embedders: HashMap::new(),
            views: ViewResolver::new(),
            data_dir: dir,
        };
        client.reconcile_all()?;
        Ok(client)
    }

    fn open_vector_files(dir: &Path, schema: &Schema) -> Result<HashMap<(String, String), VectorFile>> {
        let mut vectors = HashMap::new();
        for table in schema.tables.values() {
            for column in table.vector_columns() {
                let config = column.vector.as_ref().expect("filtered by vector_columns");
                let stem = dir.join(table.vector_file_stem(&column.name));
                let vf = VectorFile::open(stem, config.dimension)?;
                vectors.insert((table.name.clone(), column.name.clone()), vf);
            }
        }
        Ok(vectors)
    }

    fn reconcile_all(&self) -> Result<()> {
        for table in self.schema.tables.values() {
            for column in table.vector_columns() {
                if let Some(vf) = self.vectors.get(&(table.name.clone(), column.name.clone())) {
                    BatchCoordinator::reconcile_on_open(vf, &table.name, &column.name, &self.data_dir)?;
                }
            }
        }
        Ok(())
    }

    pub fn register_embedder(&mut self, name: &str, embedder: Box<dyn Embedder>) {
        self.embedders.insert(name.to_string(), embedder);
    }

    pub fn register_view(&mut self, view: ViewDescriptor) -> Result<()> {
        self.views.register(view, &self.schema).map_err(Error::from)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn view(&self, name: &str) -> Option<&ViewDescriptor> {
        self.views.get(name)
    }

    pub fn table<'a>(&'a self, name: &str) -> Result<TableHandle<'a>> {
        let table = self
            .schema
            .table(name)
            .ok_or_else(|| Error::SchemaError(format!("unknown table `{}`", name)))?;
        Ok(TableHandle::new(&self.store, table, self))
    }

    pub(crate) fn vector_file(&self, table: &str, column: &str) -> Option<&VectorFile> {
        self.vectors.get(&(table.to_string(), column.to_string()))
    }

    pub(crate) fn embedder(&self, table: &str, column: &str) -> Result<&dyn Embedder> {
        let descriptor = self
            .schema
            .table(table)
            .and_then(|t| t.column(column))
            .and_then(|c| c.vector.as_ref())
            .ok_or_else(|| Error::SchemaError(format!("`{}.{}` is not a vector column", table, column)))?;
        self.embedders
            .get(&descriptor.embedder)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::SchemaError(format!("no embedder registered as `{}`", descriptor.embedder)))
    }

    pub(crate) fn store(&self) -> &RelStore {
        &self.store
    }

    /// Embed and index `items` for `table.column`, atomically or not
    ///
    pub fn batch_embeddings(&self, table: &str, column: &str, items: &[BatchItem<'_>], atomic: bool) -> Result<usize> {
        let descriptor = self
            .schema
            .table(table)
            .ok_or_else(|| Error::SchemaError(format!("unknown table `{}`", table)))?;
        let vf = self
            .vector_file(table, column)
            .ok_or_else(|| Error::SchemaError(format!("`{}.{}` is not a vector column", table, column)))?;
        let embedder = self.embedder(table, column)?;
        let coordinator = BatchCoordinator::new(&self.store, vf, descriptor, column, embedder, &self.data_dir);
        coordinator.batch_embeddings(items, atomic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::IdentityEmbedder;
    use crate::schema::{table, ColumnType};
    use crate::value::{Row, Value};
    use tempfile::tempdir;

    fn schema() -> Schema {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("body", ColumnType::Text)
            .fts()
            .column("embedding", ColumnType::Blob)
            .vector("identity", 8)
            .build();
        Schema::builder().table(t).build()
    }

    #[test]
    fn test_create_then_open_roundtrips() {
        let dir = tempdir().unwrap();
        {
            let mut client = Client::create(dir.path(), schema()).unwrap();
            client.register_embedder("identity", Box::new(IdentityEmbedder::new(8)));
            let t = client.schema.table("documents").unwrap().clone();
            let mut row = Row::new();
            row.insert("body".into(), Value::Text("hello".into()));
            client.store.insert(&t, &row).unwrap();
        }
        let reopened = Client::open(dir.path(), schema()).unwrap();
        let rows = reopened.store.select(
            reopened.schema.table("documents").unwrap(),
            &crate::filter::Filter::new(),
        ).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_batch_embeddings_through_client() {
        let dir = tempdir().unwrap();
        let mut client = Client::create(dir.path(), schema()).unwrap();
        client.register_embedder("identity", Box::new(IdentityEmbedder::new(8)));

        let t = client.schema.table("documents").unwrap().clone();
        let mut row = Row::new();
        row.insert("body".into(), Value::Text("hello world".into()));
        let id = client.store.insert(&t, &row).unwrap();

        let count = client
            .batch_embeddings("documents", "embedding", &[BatchItem { row_id: id, text: "hello world" }], true)
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unknown_table_errors() {
        let client = Client::create(tempdir().unwrap().path(), schema()).unwrap();
        assert!(client.table("nope").is_err());
    }
}

//! Inverted index: BM25 full-text search over a table's
//! `fts`-flagged columns, backed by SQLite's FTS5 virtual tables that
//! `RelStore` maintains alongside the base table.

use crate::error::Result;
use crate::schema::TableDescriptor;
use crate::store::RelStore;

/// A thin, table-scoped view over `RelStore`'s FTS5 shadow table.
pub struct InvertedIndex<'a> {
    store: &'a RelStore,
    table: &'a TableDescriptor,
}

impl<'a> InvertedIndex<'a> {
    pub fn new(store: &'a RelStore, table: &'a TableDescriptor) -> Self {
        InvertedIndex { store, table }
    }

    /// Run a BM25 query, returning up to `limit` `(row_id, score)` pairs
    /// ordered by relevance.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(i64, f32)>> {
        self.store.bm25_search(self.table, query, limit)
    }

    pub fn has_text_index(&self) -> bool {
        self.table.fts_columns().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{table, ColumnType, Schema};
    use crate::value::{Row, Value};

    #[test]
    fn test_search_returns_matching_row() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("body", ColumnType::Text)
            .fts()
            .build();
        let schema = Schema::builder().table(t.clone()).build();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        let mut row = Row::new();
        row.insert("body".into(), Value::Text("graph search algorithms".into()));
        store.insert(&t, &row).unwrap();

        let index = InvertedIndex::new(&store, &t);
        assert!(index.has_text_index());
        let hits = index.search("graph", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }
}

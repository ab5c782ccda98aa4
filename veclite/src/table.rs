//! `TableHandle`: the fluent, per-table entry point returned
//! by `Client::table`, chaining filter predicates and terminal
//! operations (`insert`/`upsert`/`update`/`delete`/the three search
//! modes/`execute`).

use crate::client::Client;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::planner::{QueryPlanner, SearchHit};
use crate::schema::TableDescriptor;
use crate::store::RelStore;
use crate::value::{Row, Value};

/// A chainable handle over one table. Filter methods delegate to an
/// internal `Filter`, so `table.eq("status", "open").order(...).execute()`
/// reads the same way `Filter` itself does.
pub struct TableHandle<'a> {
    store: &'a RelStore,
    table: &'a TableDescriptor,
    client: &'a Client,
    filter: Filter,
}

impl<'a> TableHandle<'a> {
    pub(crate) fn new(store: &'a RelStore, table: &'a TableDescriptor, client: &'a Client) -> Self {
        TableHandle {
            store,
            table,
            client,
            filter: Filter::new(),
        }
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.neq(column, value);
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.gt(column, value);
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.gte(column, value);
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.lt(column, value);
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.lte(column, value);
        self
    }

    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.filter = self.filter.between(column, low, high);
        self
    }

    pub fn in_(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filter = self.filter.in_(column, values);
        self
    }

    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.filter = self.filter.ilike(column, pattern);
        self
    }

    pub fn regex(mut self, column: &str, pattern: &str) -> Self {
        self.filter = self.filter.regex(column, pattern);
        self
    }

    pub fn contains(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.contains(column, value);
        self
    }

    pub fn order(mut self, column: &str, order: crate::filter::Order) -> Self {
        self.filter = self.filter.order(column, order);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.filter = self.filter.limit(n);
        self
    }

    /// Run the accumulated filter chain as a plain row query.
    pub fn execute(&self) -> Result<Vec<Row>> {
        self.store.select(self.table, &self.filter)
    }

    pub fn insert(&self, row: Row) -> Result<i64> {
        self.store.insert(self.table, &row)
    }

    /// Insert if the primary key is absent from `row`, update in place
    /// otherwise.
    pub fn upsert(&self, row: Row) -> Result<i64> {
        let pk = self
            .table
            .primary_key()
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no primary key", self.table.name)))?;
        match row.get(&pk.name) {
            Some(Value::Integer(id)) => {
                let mut without_pk = row.clone();
                without_pk.remove(&pk.name);
                self.store.update(self.table, *id, &without_pk)?;
                Ok(*id)
            }
            _ => self.store.insert(self.table, &row),
        }
    }

    pub fn update(&self, row_id: i64, row: Row) -> Result<()> {
        self.store.update(self.table, row_id, &row)
    }

    pub fn delete(&self, row_id: i64) -> Result<()> {
        self.store.delete(self.table, row_id)
    }

    pub fn keyword_search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let planner = QueryPlanner::new(self.store, self.vector_file(), self.table);
        planner.keyword_search(query, &self.filter, limit)
    }

    /// Embed `query_text` with the column's registered embedder, then
    /// cosine-rank against the live vectors.
    pub fn vector_search(&self, column: &str, query_text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let embedder = self.client.embedder(&self.table.name, column)?;
        let query_vector = embedder.embed(&[query_text])?.remove(0);
        let vf = self
            .client
            .vector_file(&self.table.name, column)
            .ok_or_else(|| Error::SchemaError(format!("`{}.{}` is not a vector column", self.table.name, column)))?;
        let planner = QueryPlanner::new(self.store, Some(vf), self.table);
        planner.vector_search(&query_vector, &self.filter, limit)
    }

    pub fn hybrid_search(&self, column: &str, query_text: &str, alpha: f32, limit: usize) -> Result<Vec<SearchHit>> {
        let embedder = self.client.embedder(&self.table.name, column)?;
        let query_vector = embedder.embed(&[query_text])?.remove(0);
        let vf = self
            .client
            .vector_file(&self.table.name, column)
            .ok_or_else(|| Error::SchemaError(format!("`{}.{}` is not a vector column", self.table.name, column)))?;
        let planner = QueryPlanner::new(self.store, Some(vf), self.table);
        planner.hybrid_search(query_text, &query_vector, &self.filter, alpha, limit)
    }

    fn vector_file(&self) -> Option<&crate::vector::VectorFile> {
        self.table
            .vector_columns()
            .next()
            .and_then(|c| self.client.vector_file(&self.table.name, &c.name))
    }
}

//! Relational store: the SQLite-backed home for every
//! non-vector column, the FTS5 indexes, and the raw transactions that
//! `BatchCoordinator` spans across several high-level calls.

pub mod ddl;

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::schema::{Schema, TableDescriptor};
use crate::value::{Row, Value};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The relational store. A single `rusqlite::Connection` behind a
/// mutex: SQLite already serializes writers, and a single connection
/// keeps the `BEGIN IMMEDIATE` transactions `BatchCoordinator` spans
/// across calls simple to reason about.
pub struct RelStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl RelStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!(path = %path.display(), "opening relational store");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        register_regexp(&conn)?;
        Ok(RelStore {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        register_regexp(&conn)?;
        Ok(RelStore {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Issue every table's `CREATE TABLE`/`CREATE INDEX`/FTS5 DDL.
    pub fn create_schema(&self, schema: &Schema) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for table in schema.tables.values() {
            conn.execute_batch(&ddl::create_table_sql(table))?;
            for idx in ddl::create_index_sql(table) {
                conn.execute_batch(&idx)?;
            }
            if let Some(fts) = ddl::create_fts_sql(table) {
                conn.execute_batch(&fts)?;
            }
            if table.vector_columns().next().is_some() {
                conn.execute_batch(&ddl::create_text_hash_sql(table))?;
            }
        }
        Ok(())
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        self.conn.lock().unwrap().execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Insert a row, returning its primary key value.
    pub fn insert(&self, table: &TableDescriptor, row: &Row) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let columns: Vec<&String> = row.keys().collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let col_list = columns
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name, col_list, placeholders
        );
        let binds: Vec<&Value> = columns.iter().map(|c| &row[*c]).collect();
        conn.execute(&sql, rusqlite::params_from_iter(binds))?;
        let row_id = conn.last_insert_rowid();
        drop(conn);
        self.sync_fts(table, row_id, row)?;
        Ok(row_id)
    }

    /// Update a row in place by primary key.
    pub fn update(&self, table: &TableDescriptor, row_id: i64, row: &Row) -> Result<()> {
        let pk = table
            .primary_key()
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no primary key", table.name)))?;
        let conn = self.conn.lock().unwrap();
        let assignments = row
            .keys()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE {} = ?", table.name, assignments, pk.name);
        let mut binds: Vec<&Value> = row.values().collect();
        let id_value = Value::Integer(row_id);
        binds.push(&id_value);
        conn.execute(&sql, rusqlite::params_from_iter(binds))?;
        drop(conn);
        self.sync_fts(table, row_id, row)?;
        Ok(())
    }

    pub fn delete(&self, table: &TableDescriptor, row_id: i64) -> Result<()> {
        let pk = table
            .primary_key()
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no primary key", table.name)))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("DELETE FROM {} WHERE {} = ?", table.name, pk.name),
            [row_id],
        )?;
        if table.fts_columns().next().is_some() {
            conn.execute(
                &format!("DELETE FROM {} WHERE rowid = ?", table.fts_table_name()),
                [row_id],
            )?;
        }
        Ok(())
    }

    /// Select rows matching `filter`, returning whole rows keyed by column name.
    pub fn select(&self, table: &TableDescriptor, filter: &Filter) -> Result<Vec<Row>> {
        let (where_sql, binds) = filter.compile(table)?;
        let columns: Vec<&str> = table
            .columns
            .iter()
            .filter(|c| c.vector.is_none())
            .map(|c| c.name.as_str())
            .collect();
        let sql = format!(
            "SELECT {} FROM {} {}",
            columns.join(", "),
            table.name,
            where_sql
        );
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(binds.iter()), |r| {
            let mut row = Row::new();
            for (i, col) in columns.iter().enumerate() {
                let value: Value = r.get(i)?;
                row.insert(col.to_string(), value);
            }
            Ok(row)
        })?;
        rows.map(|r| r.map_err(Error::from)).collect()
    }

    pub fn row_by_id(&self, table: &TableDescriptor, row_id: i64) -> Result<Option<Row>> {
        let pk = table
            .primary_key()
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no primary key", table.name)))?;
        let filter = Filter::new().eq(pk.name.as_str(), row_id);
        Ok(self.select(table, &filter)?.into_iter().next())
    }

    /// Keep the FTS5 shadow table in sync. FTS5 has no triggers wired
    /// to the base table here, so every write re-derives the indexed
    /// text and issues a matching delete+insert.
    fn sync_fts(&self, table: &TableDescriptor, row_id: i64, row: &Row) -> Result<()> {
        let fts_cols: Vec<&str> = table.fts_columns().map(|c| c.name.as_str()).collect();
        if fts_cols.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("DELETE FROM {} WHERE rowid = ?", table.fts_table_name()),
            [row_id],
        )?;
        let values: Vec<String> = fts_cols
            .iter()
            .map(|c| match row.get(*c) {
                Some(Value::Text(s)) => s.clone(),
                _ => String::new(),
            })
            .collect();
        if values.iter().any(|v| !v.is_empty()) {
            let placeholders = vec!["?"; fts_cols.len() + 1].join(", ");
            let sql = format!(
                "INSERT INTO {}(rowid, {}) VALUES ({})",
                table.fts_table_name(),
                fts_cols.join(", "),
                placeholders
            );
            let mut binds: Vec<Value> = vec![Value::Integer(row_id)];
            binds.extend(values.into_iter().map(Value::Text));
            conn.execute(&sql, rusqlite::params_from_iter(binds))?;
        }
        Ok(())
    }

    /// BM25 search over the table's FTS5 shadow table; returns
    /// `(row_id, bm25_score)` ordered by relevance (least-negative-first,
    /// SQLite's `bm25()` returns more negative for better matches).
    pub fn bm25_search(&self, table: &TableDescriptor, query: &str, limit: usize) -> Result<Vec<(i64, f32)>> {
        if table.fts_columns().next().is_none() {
            return Err(Error::SchemaError(format!(
                "table `{}` has no fts-flagged columns",
                table.name
            )));
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT rowid, bm25({}) FROM {} WHERE {} MATCH ? ORDER BY bm25({}) LIMIT ?",
            table.fts_table_name(),
            table.fts_table_name(),
            table.fts_table_name(),
            table.fts_table_name(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![query, limit as i64], |r| {
            let row_id: i64 = r.get(0)?;
            let score: f64 = r.get(1)?;
            Ok((row_id, score as f32))
        })?;
        rows.map(|r| r.map_err(Error::from)).collect()
    }

    pub fn set_text_hash(&self, table: &TableDescriptor, row_id: i64, column: &str, hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {}__text_hash (row_id, column, hash) VALUES (?, ?, ?)
                 ON CONFLICT(row_id) DO UPDATE SET column = excluded.column, hash = excluded.hash",
                table.name
            ),
            rusqlite::params![row_id, column, hash],
        )?;
        Ok(())
    }

    pub fn text_hash(&self, table: &TableDescriptor, row_id: i64) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT hash FROM {}__text_hash WHERE row_id = ?", table.name),
            [row_id],
            |r| r.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            e => Err(Error::from(e)),
        })
    }
}

/// Register the `REGEXP` scalar function the `X REGEXP Y` operator
/// dispatches to, backing [`crate::filter::Filter::regex`].
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: String = ctx.get(0)?;
            let text: String = ctx.get(1)?;
            let re = Regex::new(&pattern)
                .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
            Ok(re.is_match(&text))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{table, ColumnType};

    fn docs_schema() -> (Schema, TableDescriptor) {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("title", ColumnType::Text)
            .fts()
            .column("year", ColumnType::Integer)
            .indexed()
            .build();
        let schema = Schema::builder().table(t.clone()).build();
        (schema, t)
    }

    #[test]
    fn test_insert_and_select() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        let mut row = Row::new();
        row.insert("title".into(), Value::Text("hello world".into()));
        row.insert("year".into(), Value::Integer(2020));
        let id = store.insert(&t, &row).unwrap();
        assert_eq!(id, 1);

        let fetched = store.row_by_id(&t, id).unwrap().unwrap();
        assert_eq!(fetched["title"], Value::Text("hello world".into()));
    }

    #[test]
    fn test_update_and_delete() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        let mut row = Row::new();
        row.insert("title".into(), Value::Text("first".into()));
        row.insert("year".into(), Value::Integer(1999));
        let id = store.insert(&t, &row).unwrap();

        let mut update = Row::new();
        update.insert("title".into(), Value::Text("second".into()));
        store.update(&t, id, &update).unwrap();
        let fetched = store.row_by_id(&t, id).unwrap().unwrap();
        assert_eq!(fetched["title"], Value::Text("second".into()));

        store.delete(&t, id).unwrap();
        assert!(store.row_by_id(&t, id).unwrap().is_none());
    }

    #[test]
    fn test_bm25_search_finds_matching_row() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        let mut row = Row::new();
        row.insert("title".into(), Value::Text("rust async runtime".into()));
        row.insert("year".into(), Value::Integer(2021));
        store.insert(&t, &row).unwrap();

        let results = store.bm25_search(&t, "async", 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_regexp_function_backs_regex_filter() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        let mut row = Row::new();
        row.insert("title".into(), Value::Text("abc123".into()));
        row.insert("year".into(), Value::Integer(2020));
        store.insert(&t, &row).unwrap();

        let filter = Filter::new().regex("title", "^abc[0-9]+$");
        let results = store.select(&t, &filter).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_transaction_rollback_discards_insert() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        store.begin_transaction().unwrap();
        let mut row = Row::new();
        row.insert("title".into(), Value::Text("temp".into()));
        row.insert("year".into(), Value::Integer(2020));
        store.insert(&t, &row).unwrap();
        store.rollback().unwrap();

        let results = store.select(&t, &Filter::new()).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_text_hash_roundtrip() {
        let (schema, t) = docs_schema();
        let store = RelStore::open_memory().unwrap();
        store.create_schema(&schema).unwrap();

        assert_eq!(store.text_hash(&t, 1).unwrap(), None);
        store.set_text_hash(&t, 1, "title", "deadbeef").unwrap();
        assert_eq!(store.text_hash(&t, 1).unwrap(), Some("deadbeef".to_string()));
    }
}

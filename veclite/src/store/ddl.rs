//! SQL DDL generation from [`TableDescriptor`]s.
//!
//! `RelStore::create_schema` hands each table to [`create_table_sql`]
//! and friends rather than taking hand-written `CREATE TABLE`
//! statements, since the schema is declared in Rust, not in `.sql`
//! files.

use crate::schema::{ColumnDescriptor, ColumnType, TableDescriptor};

fn sqlite_type(ty: ColumnType) -> &'static str {
    match ty {
        ColumnType::Integer => "INTEGER",
        ColumnType::Text => "TEXT",
        ColumnType::Boolean => "INTEGER",
        ColumnType::Real => "REAL",
        ColumnType::Blob => "BLOB",
        ColumnType::Json => "TEXT",
    }
}

fn column_sql(column: &ColumnDescriptor) -> String {
    let mut parts = vec![column.name.clone(), sqlite_type(column.ty).to_string()];
    if column.primary_key {
        parts.push("PRIMARY KEY".to_string());
        if column.ty == ColumnType::Integer {
            parts.push("AUTOINCREMENT".to_string());
        }
    }
    if let Some(fk) = &column.references {
        parts.push(format!("REFERENCES {}({})", fk.table, fk.column));
    }
    parts.join(" ")
}

/// `CREATE TABLE IF NOT EXISTS` for the table's non-fts, non-vector columns.
/// Vector columns are deliberately excluded: their values live in a
/// sidecar `VectorFile`, not as a SQLite column.
pub fn create_table_sql(table: &TableDescriptor) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .filter(|c| c.vector.is_none())
        .map(column_sql)
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table.name,
        columns.join(", ")
    )
}

/// One `CREATE INDEX` per `index`-flagged column.
pub fn create_index_sql(table: &TableDescriptor) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| c.index && !c.primary_key)
        .map(|c| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{}_{} ON {}({})",
                table.name, c.name, table.name, c.name
            )
        })
        .collect()
}

/// `CREATE VIRTUAL TABLE ... USING fts5` over the table's `fts`-flagged
/// columns, content-synced manually (FTS5 `content=` tables don't fire
/// triggers on every op we need, so RelStore issues matching
/// delete+insert pairs into this table itself — see
/// [`super::RelStore::sync_fts`]).
pub fn create_fts_sql(table: &TableDescriptor) -> Option<String> {
    let fts_cols: Vec<&str> = table.fts_columns().map(|c| c.name.as_str()).collect();
    if fts_cols.is_empty() {
        return None;
    }
    Some(format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS {} USING fts5({}, content='')",
        table.fts_table_name(),
        fts_cols.join(", ")
    ))
}

/// Sidecar table mapping each row to the SHA-256 hash of the text most
/// recently embedded for it, so `upsert` can skip re-embedding
/// unchanged text, an explicit re-embedding policy chosen for upsert.
pub fn create_text_hash_sql(table: &TableDescriptor) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}__text_hash (row_id INTEGER PRIMARY KEY, column TEXT NOT NULL, hash TEXT NOT NULL)",
        table.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table;

    #[test]
    fn test_create_table_sql_excludes_vector_columns() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("body", ColumnType::Text)
            .fts()
            .column("embedding", ColumnType::Blob)
            .vector("identity", 4)
            .build();

        let sql = create_table_sql(&t);
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("body TEXT"));
        assert!(!sql.contains("embedding"));
    }

    #[test]
    fn test_create_index_sql_skips_primary_key() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("year", ColumnType::Integer)
            .indexed()
            .build();

        let idx = create_index_sql(&t);
        assert_eq!(idx.len(), 1);
        assert!(idx[0].contains("idx_documents_year"));
    }

    #[test]
    fn test_create_fts_sql_none_when_no_fts_columns() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .build();
        assert!(create_fts_sql(&t).is_none());
    }

    #[test]
    fn test_create_fts_sql_joins_columns() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("title", ColumnType::Text)
            .fts()
            .column("body", ColumnType::Text)
            .fts()
            .build();
        let sql = create_fts_sql(&t).unwrap();
        assert!(sql.contains("documents__fts"));
        assert!(sql.contains("title, body"));
    }
}

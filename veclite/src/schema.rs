//! Schema declaration: tables, columns, views.
//!
//! Tables and views are plain builder functions producing descriptor
//! records, rather than a macro or derive surface, so a schema can be
//! assembled and inspected as ordinary data.

use std::collections::HashMap;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Boolean,
    Real,
    Blob,
    Json,
}

/// A foreign-key edge from a column to another table's column. This is
/// the join-graph data `ViewResolver`'s union-find connectivity check
/// operates over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

/// Embedding configuration for a `vector`-flagged column.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Name under which an `Embedder` is registered on the `Client`.
    pub embedder: String,
    /// Fixed vector dimension; embedding or appending a vector of a
    /// different length fails.
    pub dimension: usize,
}

/// A single column's descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
    pub index: bool,
    pub fts: bool,
    pub vector: Option<EmbeddingConfig>,
    pub references: Option<ForeignKey>,
}

impl ColumnDescriptor {
    fn new(name: &str, ty: ColumnType) -> Self {
        ColumnDescriptor {
            name: name.to_string(),
            ty,
            primary_key: false,
            index: false,
            fts: false,
            vector: None,
            references: None,
        }
    }
}

/// A table's descriptor: ordered columns plus the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn fts_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.fts)
    }

    pub fn vector_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.vector.is_some())
    }

    pub fn fts_table_name(&self) -> String {
        format!("{}__fts", self.name)
    }

    pub fn vector_file_stem(&self, column: &str) -> String {
        format!("{}__{}", self.name, column)
    }
}

/// Fluent builder for a [`TableDescriptor`].
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDescriptor>,
}

pub fn table(name: &str) -> TableBuilder {
    TableBuilder {
        name: name.to_string(),
        columns: Vec::new(),
    }
}

impl TableBuilder {
    pub fn column(mut self, name: &str, ty: ColumnType) -> Self {
        self.columns.push(ColumnDescriptor::new(name, ty));
        self
    }

    /// Mark the most recently added column as the primary key.
    pub fn primary_key(mut self) -> Self {
        if let Some(last) = self.columns.last_mut() {
            last.primary_key = true;
        }
        self
    }

    pub fn indexed(mut self) -> Self {
        if let Some(last) = self.columns.last_mut() {
            last.index = true;
        }
        self
    }

    pub fn fts(mut self) -> Self {
        if let Some(last) = self.columns.last_mut() {
            last.fts = true;
        }
        self
    }

    pub fn vector(mut self, embedder: &str, dimension: usize) -> Self {
        if let Some(last) = self.columns.last_mut() {
            last.vector = Some(EmbeddingConfig {
                embedder: embedder.to_string(),
                dimension,
            });
        }
        self
    }

    pub fn references(mut self, table: &str, column: &str) -> Self {
        if let Some(last) = self.columns.last_mut() {
            last.references = Some(ForeignKey {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        self
    }

    pub fn build(self) -> TableDescriptor {
        TableDescriptor {
            name: self.name,
            columns: self.columns,
        }
    }
}

/// A field projection in a view: `alias -> (source_table, source_column)`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldProjection {
    pub alias: String,
    pub table: String,
    pub column: String,
}

/// A view's descriptor: participating tables plus field projections.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDescriptor {
    pub name: String,
    pub tables: Vec<String>,
    pub fields: Vec<FieldProjection>,
}

impl ViewDescriptor {
    pub fn id_field(&self) -> Option<&FieldProjection> {
        self.fields.iter().find(|f| f.alias == "id")
    }

    pub fn field(&self, alias: &str) -> Option<&FieldProjection> {
        self.fields.iter().find(|f| f.alias == alias)
    }
}

/// Fluent builder for a [`ViewDescriptor`].
pub struct ViewBuilder {
    name: String,
    tables: Vec<String>,
    fields: Vec<FieldProjection>,
}

pub fn view(name: &str) -> ViewBuilder {
    ViewBuilder {
        name: name.to_string(),
        tables: Vec::new(),
        fields: Vec::new(),
    }
}

impl ViewBuilder {
    pub fn table(mut self, table: &TableDescriptor) -> Self {
        self.tables.push(table.name.clone());
        self
    }

    pub fn field(mut self, alias: &str, table: &str, column: &str) -> Self {
        self.fields.push(FieldProjection {
            alias: alias.to_string(),
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }

    pub fn build(self) -> ViewDescriptor {
        ViewDescriptor {
            name: self.name,
            tables: self.tables,
            fields: self.fields,
        }
    }
}

/// A schema: table name -> descriptor, view name -> descriptor.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub tables: HashMap<String, TableDescriptor>,
    pub views: HashMap<String, ViewDescriptor>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    pub fn view(&self, name: &str) -> Option<&ViewDescriptor> {
        self.views.get(name)
    }
}

#[derive(Default)]
pub struct SchemaBuilder {
    tables: Vec<TableDescriptor>,
    views: Vec<ViewDescriptor>,
}

impl SchemaBuilder {
    pub fn table(mut self, table: TableDescriptor) -> Self {
        self.tables.push(table);
        self
    }

    pub fn view(mut self, view: ViewDescriptor) -> Self {
        self.views.push(view);
        self
    }

    pub fn build(self) -> Schema {
        let mut schema = Schema::default();
        for t in self.tables {
            schema.tables.insert(t.name.clone(), t);
        }
        for v in self.views {
            schema.views.insert(v.name.clone(), v);
        }
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder() {
        let t = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("title", ColumnType::Text)
            .fts()
            .column("content", ColumnType::Text)
            .fts()
            .vector("identity", 4)
            .build();

        assert_eq!(t.name, "documents");
        assert_eq!(t.primary_key().unwrap().name, "id");
        assert_eq!(t.fts_columns().count(), 2);
        assert_eq!(t.vector_columns().count(), 1);
        assert_eq!(t.vector_file_stem("content"), "documents__content");
    }

    #[test]
    fn test_view_builder_and_id_field() {
        let documents = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .build();

        let v = view("doc_view")
            .table(&documents)
            .field("id", "documents", "id")
            .field("title", "documents", "title")
            .build();

        assert_eq!(v.id_field().unwrap().table, "documents");
        assert_eq!(v.field("title").unwrap().column, "title");
        assert!(v.field("missing").is_none());
    }

    #[test]
    fn test_schema_builder() {
        let documents = table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .build();
        let schema = Schema::builder().table(documents).build();

        assert!(schema.table("documents").is_some());
        assert!(schema.table("missing").is_none());
    }
}

//! View resolution: validates that a declared view's
//! participating tables are connected via foreign keys, and that every
//! projected field refers to a real table/column.

use crate::error::ViewError;
use crate::schema::{Schema, ViewDescriptor};
use std::collections::HashMap;

/// Union-find over table names, built from a schema's declared foreign
/// keys, used to check that every table a view names is reachable from
/// the others through some chain of FK edges.
struct UnionFind {
    parent: HashMap<String, String>,
    rank: HashMap<String, usize>,
}

impl UnionFind {
    fn new(tables: impl Iterator<Item = String>) -> Self {
        let mut parent = HashMap::new();
        let mut rank = HashMap::new();
        for t in tables {
            rank.insert(t.clone(), 0);
            parent.insert(t.clone(), t);
        }
        UnionFind { parent, rank }
    }

    fn find(&mut self, x: &str) -> String {
        let p = self.parent.get(x).cloned().unwrap_or_else(|| x.to_string());
        if p != x {
            let root = self.find(&p);
            self.parent.insert(x.to_string(), root.clone());
            root
        } else {
            p
        }
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let rank_a = *self.rank.get(&ra).unwrap_or(&0);
        let rank_b = *self.rank.get(&rb).unwrap_or(&0);
        if rank_a < rank_b {
            self.parent.insert(ra, rb);
        } else if rank_a > rank_b {
            self.parent.insert(rb, ra);
        } else {
            self.parent.insert(rb.clone(), ra.clone());
            self.rank.insert(ra, rank_a + 1);
        }
    }
}

/// Validates and holds registered [`ViewDescriptor`]s.
#[derive(Default)]
pub struct ViewResolver {
    views: HashMap<String, ViewDescriptor>,
}

impl ViewResolver {
    pub fn new() -> Self {
        ViewResolver::default()
    }

    /// Register `view` after checking, in order:
    /// - every participating table exists in `schema`
    /// - every field projection refers to a real table/column pair
    /// - the participating tables form a single connected component
    ///   under the schema's declared foreign keys
    /// - if the view declares an `id` field, that field's table has a
    ///   vector-bearing column (otherwise `vector_search` over the view
    ///   would have no embeddings to rank)
    pub fn register(&mut self, view: ViewDescriptor, schema: &Schema) -> Result<(), ViewError> {
        tracing::debug!(view = %view.name, tables = ?view.tables, "registering view");
        for table_name in &view.tables {
            if schema.table(table_name).is_none() {
                return Err(ViewError::UnknownTable(table_name.clone()));
            }
        }

        for field in &view.fields {
            let table = schema
                .table(&field.table)
                .ok_or_else(|| ViewError::UnknownTable(field.table.clone()))?;
            if table.column(&field.column).is_none() {
                return Err(ViewError::UnknownField(field.table.clone(), field.column.clone()));
            }
        }

        if view.tables.len() > 1 {
            self.check_connectivity(&view, schema)?;
        }

        if let Some(id_field) = view.id_field() {
            let table = schema.table(&id_field.table).expect("validated above");
            let has_vector = table.vector_columns().next().is_some();
            if !has_vector {
                return Err(ViewError::MissingVectorId);
            }
        }

        self.views.insert(view.name.clone(), view);
        Ok(())
    }

    fn check_connectivity(&self, view: &ViewDescriptor, schema: &Schema) -> Result<(), ViewError> {
        let mut uf = UnionFind::new(view.tables.iter().cloned());

        for table_name in &view.tables {
            let table = schema.table(table_name).expect("validated above");
            for column in &table.columns {
                if let Some(fk) = &column.references {
                    if view.tables.contains(&fk.table) {
                        uf.union(table_name, &fk.table);
                    }
                }
            }
        }

        let mut roots: Vec<String> = view.tables.iter().map(|t| uf.find(t)).collect();
        roots.sort();
        roots.dedup();
        if roots.len() > 1 {
            return Err(ViewError::DisconnectedJoin(view.tables.clone()));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ViewDescriptor> {
        self.views.get(name)
    }
}

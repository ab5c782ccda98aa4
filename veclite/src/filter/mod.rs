//! Filter algebra: an immutable chain of predicates that
//! compiles to a parameterized SQL `WHERE` clause.
//!
//! `Filter` is built up with `eq`/`between`/`in_`/... calls, each of
//! which returns a new `Filter` rather than mutating in place, so a
//! base filter can be shared and extended along several branches.

use crate::error::{Error, Result};
use crate::schema::{ColumnType, TableDescriptor};
use crate::value::Value;
use regex::Regex;

#[derive(Debug, Clone)]
enum Predicate {
    Eq(String, Value),
    Neq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    Between(String, Value, Value),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    /// JSON array/object containment: column contains `value` as an element.
    Contains(String, Value),
    Ilike(String, String),
    Regex(String, String),
}

#[derive(Debug, Clone, Copy)]
pub enum Order {
    Asc,
    Desc,
}

/// An immutable predicate chain. Every builder method consumes `self`
/// and returns a new `Filter`; the original is left untouched.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
    order_by: Option<(String, Order)>,
    limit: Option<usize>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Eq(column.to_string(), v));
        }
        self
    }

    pub fn neq(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Neq(column.to_string(), v));
        }
        self
    }

    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Gt(column.to_string(), v));
        }
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Gte(column.to_string(), v));
        }
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Lt(column.to_string(), v));
        }
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Lte(column.to_string(), v));
        }
        self
    }

    /// Inclusive range. Unset on either bound drops the predicate entirely —
    /// a `between` with one real bound degrades to that bound's own skip
    /// rule, not a half-open range, matching the "skip on unset" contract
    /// applied uniformly across comparison predicates.
    pub fn between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        let (low, high) = (low.into(), high.into());
        if !low.is_unset() && !high.is_unset() {
            self.predicates
                .push(Predicate::Between(column.to_string(), low, high));
        }
        self
    }

    pub fn in_(mut self, column: &str, values: Vec<Value>) -> Self {
        if !values.is_empty() {
            self.predicates.push(Predicate::In(column.to_string(), values));
        }
        self
    }

    pub fn not_in(mut self, column: &str, values: Vec<Value>) -> Self {
        if !values.is_empty() {
            self.predicates
                .push(Predicate::NotIn(column.to_string(), values));
        }
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.predicates.push(Predicate::IsNull(column.to_string()));
        self
    }

    pub fn is_not_null(mut self, column: &str) -> Self {
        self.predicates.push(Predicate::IsNotNull(column.to_string()));
        self
    }

    pub fn contains(mut self, column: &str, value: impl Into<Value>) -> Self {
        let v = value.into();
        if !v.is_unset() {
            self.predicates.push(Predicate::Contains(column.to_string(), v));
        }
        self
    }

    /// Case-insensitive `LIKE`. A pattern with no `%`/`_` wildcard is
    /// auto-wrapped as `%pattern%` (substring match), mirroring the
    /// ergonomics of a plain keyword search box.
    pub fn ilike(mut self, column: &str, pattern: &str) -> Self {
        let pattern = if pattern.contains('%') || pattern.contains('_') {
            pattern.to_string()
        } else {
            format!("%{}%", pattern)
        };
        self.predicates.push(Predicate::Ilike(column.to_string(), pattern));
        self
    }

    pub fn regex(mut self, column: &str, pattern: &str) -> Self {
        self.predicates
            .push(Predicate::Regex(column.to_string(), pattern.to_string()));
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order_by = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Compile into a `WHERE ...` clause (empty string if there are no
    /// predicates) plus its ordered bind parameters, validating every
    /// referenced column exists on `table` and every value's variant
    /// matches the column's declared type.
    pub fn compile(&self, table: &TableDescriptor) -> Result<(String, Vec<Value>)> {
        let mut clauses = Vec::new();
        let mut bindings = Vec::new();

        for pred in &self.predicates {
            let column_name = predicate_column(pred);
            let column = table.column(column_name).ok_or_else(|| {
                Error::SchemaError(format!(
                    "unknown column `{}` on table `{}`",
                    column_name, table.name
                ))
            })?;

            match pred {
                Predicate::Eq(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} = ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Neq(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} != ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Gt(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} > ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Gte(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} >= ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Lt(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} < ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Lte(c, v) => {
                    check_type(column.name.as_str(), column.ty, v)?;
                    clauses.push(format!("{} <= ?", c));
                    bindings.push(v.clone());
                }
                Predicate::Between(c, low, high) => {
                    check_type(column.name.as_str(), column.ty, low)?;
                    check_type(column.name.as_str(), column.ty, high)?;
                    clauses.push(format!("{} BETWEEN ? AND ?", c));
                    bindings.push(low.clone());
                    bindings.push(high.clone());
                }
                Predicate::In(c, values) => {
                    for v in values {
                        check_type(column.name.as_str(), column.ty, v)?;
                    }
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} IN ({})", c, placeholders));
                    bindings.extend(values.iter().cloned());
                }
                Predicate::NotIn(c, values) => {
                    for v in values {
                        check_type(column.name.as_str(), column.ty, v)?;
                    }
                    let placeholders = vec!["?"; values.len()].join(", ");
                    clauses.push(format!("{} NOT IN ({})", c, placeholders));
                    bindings.extend(values.iter().cloned());
                }
                Predicate::IsNull(c) => {
                    clauses.push(format!("{} IS NULL", c));
                }
                Predicate::IsNotNull(c) => {
                    clauses.push(format!("{} IS NOT NULL", c));
                }
                Predicate::Contains(c, v) => {
                    if column.ty != ColumnType::Json {
                        return Err(Error::FilterTypeError(format!(
                            "`contains` requires a json column, `{}` is {:?}",
                            c, column.ty
                        )));
                    }
                    // json_each walks both arrays and object values.
                    clauses.push(format!(
                        "EXISTS (SELECT 1 FROM json_each({}) WHERE json_each.value = ?)",
                        c
                    ));
                    bindings.push(v.clone());
                }
                Predicate::Ilike(c, pattern) => {
                    clauses.push(format!("{} LIKE ? ESCAPE '\\'", c));
                    bindings.push(Value::Text(pattern.clone()));
                }
                Predicate::Regex(c, pattern) => {
                    Regex::new(pattern).map_err(|e| Error::BadPattern(e.to_string()))?;
                    clauses.push(format!("{} REGEXP ?", c));
                    bindings.push(Value::Text(pattern.clone()));
                }
            }
        }

        let mut sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        if let Some((col, ord)) = &self.order_by {
            if table.column(col).is_none() {
                return Err(Error::SchemaError(format!(
                    "unknown order-by column `{}` on table `{}`",
                    col, table.name
                )));
            }
            let dir = match ord {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY {} {}", col, dir));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }

        Ok((sql, bindings))
    }
}

fn predicate_column(p: &Predicate) -> &str {
    match p {
        Predicate::Eq(c, _)
        | Predicate::Neq(c, _)
        | Predicate::Gt(c, _)
        | Predicate::Gte(c, _)
        | Predicate::Lt(c, _)
        | Predicate::Lte(c, _)
        | Predicate::Between(c, _, _)
        | Predicate::In(c, _)
        | Predicate::NotIn(c, _)
        | Predicate::IsNull(c)
        | Predicate::IsNotNull(c)
        | Predicate::Contains(c, _)
        | Predicate::Ilike(c, _)
        | Predicate::Regex(c, _) => c,
    }
}

fn check_type(column: &str, ty: ColumnType, value: &Value) -> Result<()> {
    let ok = matches!(
        (ty, value),
        (ColumnType::Integer, Value::Integer(_))
            | (ColumnType::Real, Value::Real(_))
            | (ColumnType::Real, Value::Integer(_))
            | (ColumnType::Text, Value::Text(_))
            | (ColumnType::Boolean, Value::Bool(_))
            | (ColumnType::Blob, Value::Blob(_))
            | (ColumnType::Json, Value::Json(_))
            | (_, Value::Null)
    );
    if ok {
        Ok(())
    } else {
        Err(Error::FilterTypeError(format!(
            "column `{}` is {:?}, value is {:?}",
            column, ty, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table;

    fn docs() -> TableDescriptor {
        table("documents")
            .column("id", ColumnType::Integer)
            .primary_key()
            .column("title", ColumnType::Text)
            .column("year", ColumnType::Integer)
            .column("tags", ColumnType::Json)
            .build()
    }

    #[test]
    fn test_eq_compiles() {
        let t = docs();
        let (sql, binds) = Filter::new().eq("title", "hello").compile(&t).unwrap();
        assert_eq!(sql, "WHERE title = ?");
        assert_eq!(binds, vec![Value::Text("hello".into())]);
    }

    #[test]
    fn test_unset_skip() {
        let t = docs();
        let (sql, binds) = Filter::new().gt("year", Value::Unset).compile(&t).unwrap();
        assert_eq!(sql, "");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_between_with_order_and_limit() {
        let t = docs();
        let (sql, binds) = Filter::new()
            .between("year", 2000i64, 2020i64)
            .order("year", Order::Asc)
            .limit(10)
            .compile(&t)
            .unwrap();
        assert_eq!(sql, "WHERE year BETWEEN ? AND ? ORDER BY year ASC LIMIT 10");
        assert_eq!(binds, vec![Value::Integer(2000), Value::Integer(2020)]);
    }

    #[test]
    fn test_between_one_unset_drops_predicate() {
        let t = docs();
        let (sql, binds) = Filter::new()
            .between("year", 2000i64, Value::Unset)
            .compile(&t)
            .unwrap();
        assert_eq!(sql, "");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_unknown_column_errors() {
        let t = docs();
        let err = Filter::new().eq("nope", "x").compile(&t).unwrap_err();
        assert!(matches!(err, Error::SchemaError(_)));
    }

    #[test]
    fn test_type_mismatch_errors() {
        let t = docs();
        let err = Filter::new().eq("year", "not a number").compile(&t).unwrap_err();
        assert!(matches!(err, Error::FilterTypeError(_)));
    }

    #[test]
    fn test_ilike_auto_wraps_plain_pattern() {
        let t = docs();
        let (sql, binds) = Filter::new().ilike("title", "foo").compile(&t).unwrap();
        assert_eq!(sql, "WHERE title LIKE ? ESCAPE '\\'");
        assert_eq!(binds, vec![Value::Text("%foo%".into())]);
    }

    #[test]
    fn test_ilike_preserves_explicit_wildcard() {
        let t = docs();
        let (sql, binds) = Filter::new().ilike("title", "foo%").compile(&t).unwrap();
        assert_eq!(binds, vec![Value::Text("foo%".into())]);
        assert_eq!(sql, "WHERE title LIKE ? ESCAPE '\\'");
    }

    #[test]
    fn test_bad_regex_pattern_errors() {
        let t = docs();
        let err = Filter::new().regex("title", "(unclosed").compile(&t).unwrap_err();
        assert!(matches!(err, Error::BadPattern(_)));
    }

    #[test]
    fn test_contains_requires_json_column() {
        let t = docs();
        let err = Filter::new().contains("title", "x").compile(&t).unwrap_err();
        assert!(matches!(err, Error::FilterTypeError(_)));

        let (sql, _) = Filter::new()
            .contains("tags", "rust")
            .compile(&t)
            .unwrap();
        assert!(sql.contains("json_each"));
    }

    #[test]
    fn test_in_empty_skips_predicate() {
        let t = docs();
        let (sql, binds) = Filter::new().in_("year", vec![]).compile(&t).unwrap();
        assert_eq!(sql, "");
        assert!(binds.is_empty());
    }
}

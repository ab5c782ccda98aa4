//! # veclite
//!
//! An embedded, local-first hybrid retrieval engine: a schema-first
//! relational store (SQLite) paired with BM25 full-text search (FTS5)
//! and flat-file vector similarity search, queryable through one
//! chainable filter algebra and fused by a single hybrid search call.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use veclite::{Client, Schema};
//! use veclite::schema::{table, ColumnType};
//! use veclite::embedder::IdentityEmbedder;
//! use veclite::value::{Row, Value};
//!
//! let documents = table("documents")
//!     .column("id", ColumnType::Integer).primary_key()
//!     .column("body", ColumnType::Text).fts()
//!     .column("embedding", ColumnType::Blob).vector("default", 8)
//!     .build();
//! let schema = Schema::builder().table(documents).build();
//!
//! let mut client = Client::create("./my-db", schema).unwrap();
//! client.register_embedder("default", Box::new(IdentityEmbedder::new(8)));
//!
//! let mut row = Row::new();
//! row.insert("body".to_string(), Value::Text("hello world".into()));
//! client.table("documents").unwrap().insert(row).unwrap();
//! # std::fs::remove_dir_all("./my-db").ok();
//! ```

pub mod batch;
pub mod client;
pub mod embedder;
pub mod error;
pub mod filter;
pub mod index;
pub mod planner;
pub mod schema;
pub mod store;
pub mod table;
pub mod value;
pub mod vector;
pub mod view;

#[cfg(feature = "async")]
pub mod async_client;

pub use client::Client;
pub use error::{Error, Result};
pub use schema::Schema;
pub use table::TableHandle;

#[cfg(feature = "async")]
pub use async_client::AsyncClient;

/// Library version, taken from the crate's own manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(feature = "logging")]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

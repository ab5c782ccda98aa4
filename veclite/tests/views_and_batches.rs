//! End-to-end scenarios for `ViewResolver` registration and
//! `BatchCoordinator` failure handling, driven through `Client`.

use tempfile::tempdir;
use veclite::embedder::{Embedder, IdentityEmbedder};
use veclite::error::Error;
use veclite::schema::{table, view, ColumnType, Schema};
use veclite::value::Row;
use veclite::Client;

fn authors_and_posts() -> Schema {
    let authors = table("authors")
        .column("id", ColumnType::Integer)
        .primary_key()
        .column("name", ColumnType::Text)
        .build();
    let posts = table("posts")
        .column("id", ColumnType::Integer)
        .primary_key()
        .column("author_id", ColumnType::Integer)
        .references("authors", "id")
        .column("body", ColumnType::Text)
        .fts()
        .column("embedding", ColumnType::Blob)
        .vector("identity", 8)
        .build();
    Schema::builder().table(authors).table(posts).build()
}

#[test]
fn view_over_joined_tables_registers_when_connected() {
    let dir = tempdir().unwrap();
    let schema = authors_and_posts();
    let mut client = Client::create(dir.path(), schema.clone()).unwrap();

    let author_posts = view("author_posts")
        .table(schema.table("authors").unwrap())
        .table(schema.table("posts").unwrap())
        .field("id", "posts", "id")
        .field("author_name", "authors", "name")
        .field("body", "posts", "body")
        .build();

    client.register_view(author_posts).unwrap();
    let resolved = client.view("author_posts").unwrap();
    assert_eq!(resolved.field("author_name").unwrap().table, "authors");
}

#[test]
fn view_over_disconnected_tables_is_rejected() {
    let dir = tempdir().unwrap();
    let standalone = table("standalone")
        .column("id", ColumnType::Integer)
        .primary_key()
        .build();
    let schema = Schema::builder()
        .table(authors_and_posts().table("authors").unwrap().clone())
        .table(standalone)
        .build();
    let mut client = Client::create(dir.path(), schema.clone()).unwrap();

    let bad_view = view("broken")
        .table(schema.table("authors").unwrap())
        .table(schema.table("standalone").unwrap())
        .field("id", "authors", "id")
        .build();

    let result = client.register_view(bad_view);
    assert!(matches!(result, Err(Error::SchemaError(_))));
}

struct FlakyEmbedder {
    inner: IdentityEmbedder,
    fail_on_text: &'static str,
}

impl Embedder for FlakyEmbedder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, texts: &[&str]) -> veclite::error::Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| *t == self.fail_on_text) {
            return Err(Error::EmbedderError(format!("refusing to embed {}", self.fail_on_text)));
        }
        self.inner.embed(texts)
    }
}

#[test]
fn atomic_batch_leaves_no_partial_vectors_on_failure() {
    let dir = tempdir().unwrap();
    let schema = authors_and_posts();
    let mut client = Client::create(dir.path(), schema).unwrap();
    client.register_embedder(
        "identity",
        Box::new(FlakyEmbedder { inner: IdentityEmbedder::new(8), fail_on_text: "boom" }),
    );

    let handle = client.table("posts").unwrap();
    let mut ok_row = Row::new();
    ok_row.insert("body".into(), "fine text".into());
    let ok_id = handle.insert(ok_row).unwrap();

    let mut bad_row = Row::new();
    bad_row.insert("body".into(), "boom".into());
    let bad_id = handle.insert(bad_row).unwrap();

    let items = vec![
        veclite::batch::BatchItem { row_id: ok_id, text: "fine text" },
        veclite::batch::BatchItem { row_id: bad_id, text: "boom" },
    ];
    let result = client.batch_embeddings("posts", "embedding", &items, true);
    assert!(result.is_err());

    // Nothing from this atomic scope should have landed, including the
    // row that would otherwise have embedded successfully.
    let hits = client.table("posts").unwrap().vector_search("embedding", "fine", 10).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn non_atomic_batch_embeds_good_rows_and_queues_failures() {
    let dir = tempdir().unwrap();
    let schema = authors_and_posts();
    let mut client = Client::create(dir.path(), schema).unwrap();
    client.register_embedder(
        "identity",
        Box::new(FlakyEmbedder { inner: IdentityEmbedder::new(8), fail_on_text: "boom" }),
    );

    let handle = client.table("posts").unwrap();
    let mut ok_row = Row::new();
    ok_row.insert("body".into(), "fine text".into());
    let ok_id = handle.insert(ok_row).unwrap();

    let mut bad_row = Row::new();
    bad_row.insert("body".into(), "boom".into());
    let bad_id = handle.insert(bad_row).unwrap();

    let items = vec![
        veclite::batch::BatchItem { row_id: ok_id, text: "fine text" },
        veclite::batch::BatchItem { row_id: bad_id, text: "boom" },
    ];
    let embedded = client.batch_embeddings("posts", "embedding", &items, false).unwrap();
    assert_eq!(embedded, 1);

    let hits = client.table("posts").unwrap().vector_search("embedding", "fine", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].row_id, ok_id);
}

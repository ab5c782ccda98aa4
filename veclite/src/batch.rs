//! Batch embedding ingestion: a scope that embeds many
//! rows' text columns in one pass, atomic or not, with crash recovery
//! via an intent log and a retryable outbox for failed embeds.

use crate::embedder::Embedder;
use crate::error::{Error, Result};
use crate::schema::TableDescriptor;
use crate::store::RelStore;
use crate::vector::VectorFile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One row queued for embedding within a `batch_embeddings` scope.
pub struct BatchItem<'a> {
    pub row_id: i64,
    pub text: &'a str,
}

/// An entry in the outbox: text that failed to embed and can be
/// retried later via [`BatchCoordinator::retry_outbox`].
#[derive(Debug, Serialize, Deserialize, Clone)]
struct OutboxEntry {
    row_id: i64,
    text_hash: String,
    text: String,
    attempts: u32,
    queued_at: String,
}

/// Crash-recovery record written before a batch starts and removed
/// once it commits, so a reopen after a crash mid-batch can tell the
/// difference between "never started" and "started but didn't finish".
#[derive(Debug, Serialize, Deserialize)]
struct IntentLog {
    table: String,
    column: String,
    row_ids: Vec<i64>,
}

/// Coordinates `RelStore` and `VectorFile` writes for a batch of
/// embeddings, so a caller-observed failure partway through an atomic
/// batch rolls back both stores rather than leaving them inconsistent.
pub struct BatchCoordinator<'a> {
    store: &'a RelStore,
    vectors: &'a VectorFile,
    table: &'a TableDescriptor,
    column: &'a str,
    embedder: &'a dyn Embedder,
    intent_log_path: PathBuf,
    outbox_path: PathBuf,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(
        store: &'a RelStore,
        vectors: &'a VectorFile,
        table: &'a TableDescriptor,
        column: &'a str,
        embedder: &'a dyn Embedder,
        data_dir: &Path,
    ) -> Self {
        let stem = format!("{}__{}", table.name, column);
        BatchCoordinator {
            store,
            vectors,
            table,
            column,
            embedder,
            intent_log_path: data_dir.join(format!("{}.intent.json", stem)),
            outbox_path: data_dir.join(format!("{}.outbox.jsonl", stem)),
        }
    }

    /// Embed every item in `items`. If `atomic` is true, any embedder
    /// failure rolls back the whole scope: the relational transaction
    /// is rolled back and every vector appended during this scope is
    /// tombstoned. If `atomic` is false, failures are appended to the
    /// outbox for later retry and the scope otherwise commits.
    pub fn batch_embeddings(&self, items: &[BatchItem<'_>], atomic: bool) -> Result<usize> {
        tracing::info!(table = %self.table.name, column = self.column, count = items.len(), atomic, "batch scope entered");
        let result = self.run_batch(items, atomic);
        match &result {
            Ok(n) => tracing::info!(table = %self.table.name, column = self.column, embedded = n, "batch scope exited"),
            Err(e) => tracing::warn!(table = %self.table.name, column = self.column, error = %e, "batch scope rolled back"),
        }
        result
    }

    fn run_batch(&self, items: &[BatchItem<'_>], atomic: bool) -> Result<usize> {
        self.write_intent_log(items)?;

        if atomic {
            self.store.begin_transaction()?;
        }

        let mut embedded = 0;
        let mut appended_row_ids = Vec::new();
        let mut failure: Option<Error> = None;

        for item in items {
            let hash = text_hash(item.text);
            if self.store.text_hash(self.table, item.row_id)?.as_deref() == Some(hash.as_str()) {
                continue;
            }

            match self.embedder.embed(&[item.text]) {
                Ok(vectors) => {
                    let vector = &vectors[0];
                    self.vectors.append(item.row_id, vector)?;
                    self.store.set_text_hash(self.table, item.row_id, self.column, &hash)?;
                    appended_row_ids.push(item.row_id);
                    embedded += 1;
                }
                Err(e) => {
                    if atomic {
                        failure = Some(e);
                        break;
                    } else {
                        self.append_outbox(item.row_id, &hash, item.text)?;
                    }
                }
            }
        }

        if let Some(e) = failure {
            for row_id in &appended_row_ids {
                self.vectors.mark_deleted(*row_id)?;
            }
            self.store.rollback()?;
            self.clear_intent_log()?;
            return Err(e);
        }

        if atomic {
            self.store.commit()?;
        }
        self.clear_intent_log()?;
        Ok(embedded)
    }

    /// Re-embed every entry currently in the outbox, removing entries
    /// that succeed. Safe to call on an empty outbox.
    pub fn retry_outbox(&self) -> Result<usize> {
        let entries = self.read_outbox()?;
        if entries.is_empty() {
            return Ok(0);
        }

        let mut remaining = Vec::new();
        let mut recovered = 0;
        for mut entry in entries {
            match self.embedder.embed(&[entry.text.as_str()]) {
                Ok(vectors) => {
                    self.vectors.append(entry.row_id, &vectors[0])?;
                    self.store
                        .set_text_hash(self.table, entry.row_id, self.column, &entry.text_hash)?;
                    recovered += 1;
                }
                Err(_) => {
                    entry.attempts += 1;
                    remaining.push(entry);
                }
            }
        }
        self.write_outbox(&remaining)?;
        Ok(recovered)
    }

    /// Called at `Client::open`: if an intent log from a prior process
    /// is present, the batch it describes never reached `commit`, so
    /// any vectors appended for its row ids are tombstoned to restore
    /// consistency between the relational store and the vector file.
    /// A free function (not a method) since reconciliation runs before
    /// an embedder is registered.
    pub fn reconcile_on_open(vectors: &VectorFile, table: &str, column: &str, data_dir: &Path) -> Result<()> {
        let stem = format!("{}__{}", table, column);
        let intent_log_path = data_dir.join(format!("{}.intent.json", stem));
        if !intent_log_path.exists() {
            return Ok(());
        }
        let data = std::fs::read(&intent_log_path)?;
        let log: IntentLog = serde_json::from_slice(&data)?;
        if log.table == table && log.column == column {
            for row_id in &log.row_ids {
                vectors.mark_deleted(*row_id)?;
            }
        }
        std::fs::remove_file(&intent_log_path)?;
        Ok(())
    }

    fn write_intent_log(&self, items: &[BatchItem<'_>]) -> Result<()> {
        let log = IntentLog {
            table: self.table.name.clone(),
            column: self.column.to_string(),
            row_ids: items.iter().map(|i| i.row_id).collect(),
        };
        let tmp_path = self.intent_log_path.with_extension("intent.json.tmp");
        let mut tmp = std::fs::File::create(&tmp_path)?;
        tmp.write_all(&serde_json::to_vec(&log)?)?;
        tmp.sync_all()?;
        drop(tmp);
        std::fs::rename(&tmp_path, &self.intent_log_path)?;
        Ok(())
    }

    fn clear_intent_log(&self) -> Result<()> {
        if self.intent_log_path.exists() {
            std::fs::remove_file(&self.intent_log_path)?;
        }
        Ok(())
    }

    fn read_outbox(&self) -> Result<Vec<OutboxEntry>> {
        if !self.outbox_path.exists() {
            return Ok(Vec::new());
        }
        let data = std::fs::read_to_string(&self.outbox_path)?;
        data.lines()
            .filter(|l| !l.is_empty())
            .map(|l| serde_json::from_str(l).map_err(Error::from))
            .collect()
    }

    fn write_outbox(&self, entries: &[OutboxEntry]) -> Result<()> {
        let tmp_path = self.outbox_path.with_extension("outbox.jsonl.tmp");
        let mut tmp = std::fs::File::create(&tmp_path)?;
        for entry in entries {
            tmp.write_all(serde_json::to_string(entry)?.as_bytes())?;
            tmp.write_all(b"\n")?;
        }
        tmp.sync_all()?;
        drop(tmp);
        std::fs::rename(&tmp_path, &self.outbox_path)?;
        Ok(())
    }

    fn append_outbox(&self, row_id: i64, hash: &str, text: &str) -> Result<()> {
        let mut entries = self.read_outbox()?;
        entries.push(OutboxEntry {
            row_id,
            text_hash: hash.to_string(),
            text: text.to_string(),
            attempts: 1,
            queued_at: chrono::Utc::now().to_rfc3339(),
        });
        self.write_outbox(&entries)
    }
}

fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

//! Query planner: keyword, vector, and hybrid search over a
//! single table, including the candidate-set restriction a `Filter`
//! contributes and the min-max score fusion hybrid search performs.

use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::index::InvertedIndex;
use crate::schema::TableDescriptor;
use crate::store::RelStore;
use crate::vector::VectorFile;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub row_id: i64,
    pub score: f32,
}

struct ScoredCandidate {
    row_id: i64,
    score: f32,
}

impl PartialEq for ScoredCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}
impl Eq for ScoredCandidate {}
impl PartialOrd for ScoredCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ScoredCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) acts as a min-heap on
        // score, letting `peek`/`pop` evict the worst candidate once
        // the heap exceeds its size-k cap.
        other.score.total_cmp(&self.score)
    }
}

pub struct QueryPlanner<'a> {
    store: &'a RelStore,
    vectors: Option<&'a VectorFile>,
    table: &'a TableDescriptor,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(store: &'a RelStore, vectors: Option<&'a VectorFile>, table: &'a TableDescriptor) -> Self {
        QueryPlanner { store, vectors, table }
    }

    fn candidate_rows(&self, filter: &Filter) -> Result<Option<Vec<i64>>> {
        if filter.is_empty() {
            return Ok(None);
        }
        let pk = self
            .table
            .primary_key()
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no primary key", self.table.name)))?;
        let rows = self.store.select(self.table, filter)?;
        let ids = rows
            .iter()
            .filter_map(|r| match r.get(&pk.name) {
                Some(crate::value::Value::Integer(i)) => Some(*i),
                _ => None,
            })
            .collect();
        Ok(Some(ids))
    }

    pub fn keyword_search(&self, query: &str, filter: &Filter, limit: usize) -> Result<Vec<SearchHit>> {
        let index = InvertedIndex::new(self.store, self.table);
        let candidates = self.candidate_rows(filter)?;
        // Overfetch so post-filtering by the candidate set still leaves
        // `limit` results when the filter is selective.
        let fetch = if candidates.is_some() { limit * 4 + limit } else { limit };
        let hits = index.search(query, fetch.max(limit))?;
        let filtered = match &candidates {
            Some(allowed) => hits
                .into_iter()
                .filter(|(id, _)| allowed.contains(id))
                .collect::<Vec<_>>(),
            None => hits,
        };
        Ok(filtered
            .into_iter()
            .take(limit)
            .map(|(row_id, score)| SearchHit { row_id, score })
            .collect())
    }

    pub fn vector_search(&self, query_vector: &[f32], filter: &Filter, limit: usize) -> Result<Vec<SearchHit>> {
        let vectors = self
            .vectors
            .ok_or_else(|| Error::SchemaError(format!("table `{}` has no vector column", self.table.name)))?;
        if query_vector.len() != vectors.dimension() {
            return Err(Error::SchemaError(format!(
                "query vector has dimension {}, column expects {}",
                query_vector.len(),
                vectors.dimension()
            )));
        }
        let candidates = self.candidate_rows(filter)?;

        let mut heap: BinaryHeap<ScoredCandidate> = BinaryHeap::new();
        for (row_id, vector) in vectors.iter_live() {
            if let Some(allowed) = &candidates {
                if !allowed.contains(&row_id) {
                    continue;
                }
            }
            let score = cosine_similarity(query_vector, &vector);
            if heap.len() < limit {
                heap.push(ScoredCandidate { row_id, score });
            } else if let Some(worst) = heap.peek() {
                if score > worst.score {
                    heap.pop();
                    heap.push(ScoredCandidate { row_id, score });
                }
            }
        }

        let mut hits: Vec<SearchHit> = heap
            .into_iter()
            .map(|c| SearchHit { row_id: c.row_id, score: c.score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.row_id.cmp(&b.row_id)));
        Ok(hits)
    }

    /// Fuse keyword and vector search via min-max normalized score
    /// combination: `alpha * vector_norm + (1 - alpha) * keyword_norm`.
    /// `alpha = 1.0` degenerates to pure vector search, `alpha = 0.0`
    /// to pure keyword search (both exactly, not just approximately,
    /// since a row absent from one side contributes 0 to that side).
    pub fn hybrid_search(
        &self,
        query_text: &str,
        query_vector: &[f32],
        filter: &Filter,
        alpha: f32,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let overfetch = limit.max(50);
        let keyword_hits = self.keyword_search(query_text, filter, overfetch)?;
        let vector_hits = self.vector_search(query_vector, filter, overfetch)?;

        let kw_norm = normalize(&keyword_hits);
        let vec_norm = normalize(&vector_hits);

        let mut combined: std::collections::HashMap<i64, f32> = std::collections::HashMap::new();
        for (row_id, score) in &kw_norm {
            *combined.entry(*row_id).or_insert(0.0) += (1.0 - alpha) * score;
        }
        for (row_id, score) in &vec_norm {
            *combined.entry(*row_id).or_insert(0.0) += alpha * score;
        }

        let mut hits: Vec<SearchHit> = combined
            .into_iter()
            .map(|(row_id, score)| SearchHit { row_id, score })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.row_id.cmp(&b.row_id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

/// Min-max normalize scores to `[0, 1]`. BM25 scores from SQLite are
/// negative (more negative is better), so they're negated first —
/// normalization then treats "closer to the best score" uniformly for
/// both keyword and vector sides.
fn normalize(hits: &[SearchHit]) -> Vec<(i64, f32)> {
    if hits.is_empty() {
        return Vec::new();
    }
    let raw: Vec<(i64, f32)> = hits.iter().map(|h| (h.row_id, -h.score)).collect();
    let min = raw.iter().map(|(_, s)| *s).fold(f32::INFINITY, f32::min);
    let max = raw.iter().map(|(_, s)| *s).fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return raw.into_iter().map(|(id, _)| (id, 1.0)).collect();
    }
    raw.into_iter().map(|(id, s)| (id, (s - min) / (max - min))).collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

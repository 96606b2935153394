use std::collections::HashMap;

use uuid::Uuid;

use crate::config::Bm25Params;
use crate::text::tokenize;

const MIN_LOG_ARG: f32 = 1e-9;
const MIN_AVG_LEN: f32 = 1e-9;

/// Incremental BM25 lexical index (spec §4.3).
///
/// Callable concurrently from the facade's serialized context; every
/// operation here is synchronous and infallible — the caller is responsible
/// for not underflowing the index's state (removing a nonexistent document
/// is a documented no-op).
pub struct Bm25Index {
    tokens: HashMap<Uuid, Vec<String>>,
    lengths: HashMap<Uuid, usize>,
    /// term -> number of documents containing it.
    doc_freq: HashMap<String, usize>,
    /// term -> doc_id -> term frequency within that doc. An implementation
    /// detail kept alongside `doc_freq` so `search` doesn't need to
    /// re-tokenize or rescan every document's token list per query term.
    postings: HashMap<String, HashMap<Uuid, usize>>,
    total_length: u64,
    params: Bm25Params,
}

impl Bm25Index {
    /// Builds the index from an initial document set. Duplicate IDs: the
    /// last occurrence wins. Tokens are cached per document at construction.
    pub fn new<I>(docs: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = (Uuid, String)>,
    {
        let mut index = Self {
            tokens: HashMap::new(),
            lengths: HashMap::new(),
            doc_freq: HashMap::new(),
            postings: HashMap::new(),
            total_length: 0,
            params,
        };
        for (id, text) in docs {
            index.insert_or_update(id, &text);
        }
        index
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.tokens.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn mean_length(&self) -> f32 {
        if self.tokens.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.tokens.len() as f32
        }
    }

    /// Idempotent upsert: if `id` already exists, its old term-frequency
    /// contributions are subtracted before the new ones are added.
    pub fn insert_or_update(&mut self, id: Uuid, text: &str) {
        if self.tokens.contains_key(&id) {
            self.remove(&id);
        }

        let toks = tokenize(text);
        let len = toks.len();

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for t in &toks {
            *tf.entry(t.as_str()).or_insert(0) += 1;
        }
        for (term, count) in &tf {
            let postings = self.postings.entry(term.to_string()).or_default();
            postings.insert(id, *count);
            *self.doc_freq.entry(term.to_string()).or_insert(0) += 1;
        }

        self.total_length += len as u64;
        self.lengths.insert(id, len);
        self.tokens.insert(id, toks);
    }

    /// Deletes the document and subtracts its term contributions. No-op if
    /// `id` is absent.
    pub fn remove(&mut self, id: &Uuid) {
        let Some(toks) = self.tokens.remove(id) else {
            return;
        };
        let len = self.lengths.remove(id).unwrap_or(0);
        self.total_length = self.total_length.saturating_sub(len as u64);

        let mut seen: HashMap<&str, ()> = HashMap::new();
        for t in &toks {
            if seen.insert(t.as_str(), ()).is_some() {
                continue;
            }
            if let Some(postings) = self.postings.get_mut(t) {
                postings.remove(id);
                if postings.is_empty() {
                    self.postings.remove(t);
                }
            }
            if let Some(df) = self.doc_freq.get_mut(t) {
                *df = df.saturating_sub(1);
                if *df == 0 {
                    self.doc_freq.remove(t);
                }
            }
        }
    }

    /// Tokenizes `query` and scores every indexed document, returning the
    /// top `top_k` by descending BM25 score (ties broken by no particular
    /// order beyond the stable sort; entries with score <= 0 are dropped).
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(Uuid, f32)> {
        let avg_len = self.mean_length();
        if avg_len == 0.0 || top_k == 0 {
            return Vec::new();
        }
        let avg_len = avg_len.max(MIN_AVG_LEN);

        let n = self.tokens.len() as f32;
        let query_terms = tokenize(query);

        let mut scores: HashMap<Uuid, f32> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf_arg = ((n - df + 0.5) / (df + 0.5)).max(MIN_LOG_ARG);
            let idf = idf_arg.ln();

            for (&doc_id, &tf) in postings {
                let doc_len = *self.lengths.get(&doc_id).unwrap_or(&0) as f32;
                let numerator = tf as f32 * (self.params.k1 + 1.0);
                let denominator =
                    tf as f32 + self.params.k1 * (1.0 - self.params.b + self.params.b * (doc_len / avg_len));
                let term_score = idf * (numerator / denominator);
                *scores.entry(doc_id).or_insert(0.0) += term_score;
            }
        }

        let mut results: Vec<(Uuid, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    /// Clears all maps; the index must be rebuilt (via `new`) before reuse.
    pub fn unload(&mut self) {
        self.tokens.clear();
        self.lengths.clear();
        self.doc_freq.clear();
        self.postings.clear();
        self.total_length = 0;
    }

    pub fn token_count(&self, id: &Uuid) -> Option<usize> {
        self.tokens.get(id).map(|t| t.len())
    }

    pub fn doc_frequency(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }
}

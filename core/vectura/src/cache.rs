use std::collections::HashMap;

use uuid::Uuid;

use crate::document::Document;
use crate::math::normalize;

/// Write-through in-memory mirror of persisted documents, plus the derived
/// unit-normalized view used by full-memory search (spec §3/§4.7/§4.8).
///
/// `Document.embedding` is the embedder's raw output as persisted to disk;
/// the normalized view is kept separately so storage never has to round-trip
/// through normalization to recover the original vector.
///
/// Not internally synchronized: the facade serializes all access through its
/// own exclusive context (spec §5), so this type is plain, single-threaded
/// state rather than an `Arc<Mutex<..>>` of its own.
#[derive(Debug, Default)]
pub struct DocumentCache {
    by_id: HashMap<Uuid, Document>,
    normalized: HashMap<Uuid, Vec<f32>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self { by_id: HashMap::new(), normalized: HashMap::new() }
    }

    /// Builds the cache from persisted documents, re-deriving the normalized
    /// view for each. Documents whose embedding norm falls below the
    /// rejection floor are skipped (they could only have reached storage via
    /// out-of-band tampering, since `add`/`update` reject them at ingress).
    pub fn from_documents(docs: Vec<Document>) -> Self {
        let mut cache = Self::new();
        for doc in docs {
            cache.put(doc);
        }
        cache
    }

    pub fn get(&self, id: &Uuid) -> Option<&Document> {
        self.by_id.get(id)
    }

    pub fn get_normalized(&self, id: &Uuid) -> Option<&[f32]> {
        self.normalized.get(id).map(|v| v.as_slice())
    }

    /// Inserts or overwrites `doc`, recomputing its normalized view.
    /// Silently skips caching the embedding of a document whose norm is
    /// below the rejection floor; callers validate this earlier for
    /// newly-embedded text, so this only guards against pre-existing,
    /// out-of-band-tampered storage state.
    pub fn put(&mut self, doc: Document) {
        if let Ok(n) = normalize(&doc.embedding) {
            self.normalized.insert(doc.id, n);
        } else {
            self.normalized.remove(&doc.id);
        }
        self.by_id.insert(doc.id, doc);
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Document> {
        self.normalized.remove(id);
        self.by_id.remove(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Document> {
        self.by_id.values()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.normalized.clear();
    }

    /// `(id, normalized_embedding)` pairs for every cached document, used
    /// directly as the corpus for full-memory search.
    pub fn normalized_corpus(&self) -> Vec<(Uuid, Vec<f32>)> {
        self.normalized.iter().map(|(id, v)| (*id, v.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(text: &str) -> Document {
        Document::new(Uuid::new_v4(), text.to_string(), vec![3.0, 4.0], Utc::now())
    }

    #[test]
    fn put_then_get_round_trips_raw_embedding() {
        let mut cache = DocumentCache::new();
        let d = doc("hello");
        let id = d.id;
        cache.put(d);
        assert_eq!(cache.get(&id).unwrap().text, "hello");
        assert_eq!(cache.get(&id).unwrap().embedding, vec![3.0, 4.0]);
    }

    #[test]
    fn normalized_view_has_unit_norm() {
        let mut cache = DocumentCache::new();
        let d = doc("hello");
        let id = d.id;
        cache.put(d);
        let n = cache.get_normalized(&id).unwrap();
        let norm: f32 = n.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn remove_drops_both_raw_and_normalized() {
        let mut cache = DocumentCache::new();
        let d = doc("hello");
        let id = d.id;
        cache.put(d);
        cache.remove(&id);
        assert!(cache.get(&id).is_none());
        assert!(cache.get_normalized(&id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn from_documents_indexes_by_id() {
        let docs = vec![doc("a"), doc("b")];
        let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
        let cache = DocumentCache::from_documents(docs);
        assert_eq!(cache.len(), 2);
        for id in ids {
            assert!(cache.get(&id).is_some());
            assert!(cache.get_normalized(&id).is_some());
        }
    }
}

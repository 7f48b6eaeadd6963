//! # Dipamkara — Storage/query engine
//!
//! In-memory state plus every mutating and querying operation. Three
//! containers and a counter, all keyed by the canonical text form of a
//! vector (its JSON array):
//!
//! ```text
//! vectors   : vector key → document id        (membership = record exists)
//! indices   : index name → { vector key → value at that field }
//! documents : document id → body              (cache; complete iff `cached`)
//! counter   : next document id, strictly monotonic, never reused
//! ```
//!
//! ## Lock discipline
//!
//! Four async mutexes — V (`vectors`), I (`indices`), D (`documents`),
//! K (`counter`) — acquired only in the order `V → I → D → K`, each
//! operation taking the prefix it needs. This acyclic order is the sole
//! deadlock-avoidance mechanism; helpers below never lock on their own and
//! instead receive the guards' targets, so no path can re-enter a held lock.
//!
//! Read-only queries clone a momentary snapshot of the key set and score it
//! entirely outside the locks; they tolerate concurrent mutation and may
//! observe a half-applied batch, but never a partial record.

use crate::dsl::{self, Index, Indices};
use crate::error::{DbError, Result};
use crate::metric::Metric;
use crate::storage::{Archive, Document, VectorTable};
use rayon::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One scored candidate: the canonical key and its distance to the query.
struct Scored {
    key: String,
    distance: f64,
}

/// The engine. One long-lived instance per database directory; tests build
/// as many independent instances over distinct directories as they like.
pub struct Dipamkara {
    dimension: usize,
    cached: bool,
    archive: Archive,
    vectors: Mutex<VectorTable>,
    indices: Mutex<Indices>,
    documents: Mutex<HashMap<u64, Document>>,
    counter: Mutex<u64>,
}

impl Dipamkara {
    /// Open (creating if absent) the database under `db_path`.
    ///
    /// Startup order matters: the id counter is computed over *every* file in
    /// `zen/` before orphan GC runs, so ids belonging to orphaned writes are
    /// burned rather than reissued.
    pub async fn open(dimension: usize, db_path: impl Into<PathBuf>, cached: bool) -> Result<Self> {
        let archive = Archive::open(db_path).await?;
        let vectors = archive.load_vectors().await?;
        let indices = archive.load_indices().await?;

        let file_ids = archive.scan_document_ids().await?;
        let counter = vectors
            .values()
            .copied()
            .chain(file_ids.iter().copied())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        let live: HashSet<u64> = vectors.values().copied().collect();
        let orphans = archive.remove_orphans(&live).await?;
        if orphans > 0 {
            info!(orphans, "garbage-collected orphan document files");
        }

        let mut documents = HashMap::new();
        if cached {
            for id in &live {
                documents.insert(*id, archive.read_document(*id).await?);
            }
        }

        info!(
            dimension,
            records = vectors.len(),
            indices = indices.len(),
            cached,
            path = %archive.root().display(),
            "database opened"
        );
        Ok(Self {
            dimension,
            cached,
            archive,
            vectors: Mutex::new(vectors),
            indices: Mutex::new(indices),
            documents: Mutex::new(documents),
            counter: Mutex::new(counter),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_fully_cached(&self) -> bool {
        self.cached
    }

    pub fn archive_dir(&self) -> &Path {
        self.archive.root()
    }

    /// Canonical text form of a vector: its JSON array. The primary identity
    /// of a record; two vectors with byte-identical canonical form are the
    /// same record.
    pub fn canonical_key(&self, vector: &[f64]) -> Result<String> {
        self.check_shape(vector)?;
        Ok(serde_json::to_string(vector)?)
    }

    fn check_shape(&self, vector: &[f64]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(DbError::VectorShape(format!(
                "vector is {}-dimensional, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(DbError::VectorShape(
                "vector contains non-finite components".to_string(),
            ));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new record.
    ///
    /// The document file is written and verified before any in-memory state
    /// changes; newly requested indices are built before the commit point so
    /// that every failure path leaves the engine exactly as it was (modulo a
    /// deleted orphan file). Requesting an index that does not exist yet
    /// creates and populates it, new record included.
    pub async fn create(
        &self,
        vector: &[f64],
        document: Document,
        index: &[String],
        cached: bool,
    ) -> Result<bool> {
        let key = self.canonical_key(vector)?;

        // lock order: V → I → D → K, held to the end of the operation
        let mut vectors = self.vectors.lock().await;
        let mut indices = self.indices.lock().await;
        let mut documents = self.documents.lock().await;
        let mut counter = self.counter.lock().await;

        if vectors.contains_key(&key) {
            return Err(DbError::VectorExists(key));
        }
        for name in index {
            if let Some(token) = dsl::reserved_token_in(name) {
                return Err(DbError::IndexName(name.clone(), token));
            }
            if !indices.contains_key(name) && !document.contains_key(name) {
                return Err(DbError::IndexNotExist(name.clone()));
            }
        }

        let id = *counter;
        if !self.archive.write_document(id, &document).await? {
            self.archive.remove_document(id).await;
            return Err(DbError::Io(std::io::Error::other(
                "document write failed verification",
            )));
        }

        // Build newly requested indices from the pre-existing records first;
        // a read failure here must leave no partial record behind.
        let mut built: Vec<(String, Index)> = Vec::new();
        for name in index {
            if indices.contains_key(name) || built.iter().any(|(n, _)| n == name) {
                continue;
            }
            match build_index(&self.archive, name, &vectors, &mut documents, self.cached).await {
                Ok(map) => built.push((name.clone(), map)),
                Err(err) => {
                    self.archive.remove_document(id).await;
                    return Err(err);
                }
            }
        }

        // Commit point: nothing below fails until the snapshot writes.
        vectors.insert(key.clone(), id);
        for (name, map) in built {
            indices.insert(name, map);
        }
        for (field, value) in &document {
            if let Some(entries) = indices.get_mut(field) {
                entries.insert(key.clone(), value.clone());
            }
        }
        if self.cached || cached {
            documents.insert(id, document);
        }
        *counter += 1;

        debug!(id, key = %key, "record created");
        self.archive.snapshot_vectors(&vectors).await?;
        self.archive.snapshot_indices(&indices).await?;
        Ok(true)
    }

    /// Remove one record. `true` if it was live, `false` if absent.
    ///
    /// `insta_save` controls whether the `.vec`/`.inv` snapshots are written
    /// immediately; `indexed_remove` batches and snapshots once at the end.
    pub async fn remove_by_vector(&self, vector: &[f64], insta_save: bool) -> Result<bool> {
        let key = self.canonical_key(vector)?;
        self.remove_by_key(&key, insta_save).await
    }

    async fn remove_by_key(&self, key: &str, insta_save: bool) -> Result<bool> {
        let mut vectors = self.vectors.lock().await;
        let mut indices = self.indices.lock().await;
        let mut documents = self.documents.lock().await;

        let Some(id) = vectors.shift_remove(key) else {
            return Ok(false);
        };
        // In-memory removal is atomic; the file delete is best-effort and a
        // leftover file is collected as an orphan on the next startup.
        self.archive.remove_document(id).await;
        documents.remove(&id);
        for entries in indices.values_mut() {
            entries.shift_remove(key);
        }
        debug!(id, key, "record removed");

        if insta_save {
            self.archive.snapshot_vectors(&vectors).await?;
            self.archive.snapshot_indices(&indices).await?;
        }
        Ok(true)
    }

    /// Remove every record matched by the filter expression, then snapshot
    /// once. A failure mid-batch aborts the rest but keeps what was already
    /// removed, and the snapshot is still taken.
    pub async fn indexed_remove(&self, query: &str) -> Result<bool> {
        let matched = {
            let indices = self.indices.lock().await;
            dsl::evaluate(query, &indices)?
        };
        if matched.is_empty() {
            return Ok(true);
        }

        let mut failure = None;
        for key in matched {
            if let Err(err) = self.remove_by_key(&key, false).await {
                failure = Some(err);
                break;
            }
        }
        {
            let vectors = self.vectors.lock().await;
            let indices = self.indices.lock().await;
            self.archive.snapshot_vectors(&vectors).await?;
            self.archive.snapshot_indices(&indices).await?;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(true),
        }
    }

    /// Build a new inverted index over every live record and return it.
    pub async fn create_index(&self, name: &str) -> Result<Index> {
        if let Some(token) = dsl::reserved_token_in(name) {
            return Err(DbError::IndexName(name.to_string(), token));
        }
        let vectors = self.vectors.lock().await;
        let mut indices = self.indices.lock().await;
        let mut documents = self.documents.lock().await;

        if indices.contains_key(name) {
            return Err(DbError::IndexExists(name.to_string()));
        }
        let built = build_index(&self.archive, name, &vectors, &mut documents, self.cached).await?;
        indices.insert(name.to_string(), built.clone());
        debug!(index = name, entries = built.len(), "index created");

        self.archive.snapshot_vectors(&vectors).await?;
        self.archive.snapshot_indices(&indices).await?;
        Ok(built)
    }

    /// Drop an inverted index. Documents are untouched.
    pub async fn remove_index(&self, name: &str) -> Result<bool> {
        let mut indices = self.indices.lock().await;
        if indices.shift_remove(name).is_none() {
            return Err(DbError::IndexNotExist(name.to_string()));
        }
        debug!(index = name, "index removed");
        // Only I is held here; `.vec` is unchanged by this operation and
        // acquiring V now would break the lock order.
        self.archive.snapshot_indices(&indices).await?;
        Ok(true)
    }

    /// Overwrite one existing field of a record's document.
    ///
    /// The mutated body is persisted first; the inverted-index entry (if the
    /// field is indexed) is only updated after the file write succeeds.
    pub async fn mod_doc_by_vector(&self, vector: &[f64], key: &str, value: Value) -> Result<bool> {
        let vk = self.canonical_key(vector)?;
        let vectors = self.vectors.lock().await;
        let mut indices = self.indices.lock().await;
        let mut documents = self.documents.lock().await;

        let Some(&id) = vectors.get(&vk) else {
            return Err(DbError::VectorNotExist(vk));
        };
        let mut doc = fetch_document(&self.archive, &mut documents, id, self.cached).await?;
        if !doc.contains_key(key) {
            return Err(DbError::FieldNotExist(key.to_string()));
        }
        doc.insert(key.to_string(), value.clone());

        if !self.archive.write_document(id, &doc).await? {
            return Err(DbError::Io(std::io::Error::other(
                "document rewrite failed verification",
            )));
        }
        if self.cached || documents.contains_key(&id) {
            documents.insert(id, doc);
        }
        if let Some(entries) = indices.get_mut(key) {
            entries.insert(vk.clone(), value);
        }
        debug!(id, field = key, "document field modified");

        self.archive.snapshot_vectors(&vectors).await?;
        self.archive.snapshot_indices(&indices).await?;
        Ok(true)
    }

    /// Flush `.vec` and `.inv` from a momentary copy of the in-memory state.
    pub async fn save(&self) -> Result<bool> {
        let vectors = { self.vectors.lock().await.clone() };
        let indices = { self.indices.lock().await.clone() };
        self.archive.snapshot_vectors(&vectors).await?;
        self.archive.snapshot_indices(&indices).await?;
        Ok(true)
    }

    /// Drop a record's cached body. The record itself stays on disk.
    ///
    /// Returns `true` whether or not a cached body was actually present;
    /// an unknown vector is an error.
    pub async fn invalidate_cached_doc_by_vector(&self, vector: &[f64]) -> Result<bool> {
        let key = self.canonical_key(vector)?;
        let vectors = self.vectors.lock().await;
        let Some(&id) = vectors.get(&key) else {
            return Err(DbError::VectorNotExist(key));
        };
        let mut documents = self.documents.lock().await;
        documents.remove(&id);
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Exhaustive k-nearest search over every live vector.
    ///
    /// Results sort by ascending distance, ties resolved by insertion order;
    /// `top_k` beyond the population size is clamped, not an error.
    pub async fn vector_query(
        &self,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        let scored = self.scored_all(vector, metric, top_k).await?;
        Ok(scored.into_iter().filter_map(materialize).collect())
    }

    /// As [`vector_query`](Self::vector_query), restricted to the records
    /// matched by the filter expression.
    pub async fn indexed_vector_query(
        &self,
        query: &str,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        let scored = self.scored_filtered(query, vector, metric, top_k).await?;
        Ok(scored.into_iter().filter_map(materialize).collect())
    }

    /// K-nearest search returning document bodies alongside distances.
    pub async fn find_documents_by_vector(
        &self,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
        cached: bool,
    ) -> Result<Vec<(Document, f64)>> {
        let scored = self.scored_all(vector, metric, top_k).await?;
        self.resolve_documents(scored, cached).await
    }

    /// Filtered variant of [`find_documents_by_vector`](Self::find_documents_by_vector).
    pub async fn find_documents_by_vector_indexed(
        &self,
        query: &str,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
        cached: bool,
    ) -> Result<Vec<(Document, f64)>> {
        let scored = self.scored_filtered(query, vector, metric, top_k).await?;
        self.resolve_documents(scored, cached).await
    }

    /// Snapshot of engine meta: path, cache flag, counter, live vectors,
    /// indices, and the currently cached documents.
    pub async fn insight(&self) -> Result<Value> {
        let vectors = { self.vectors.lock().await.clone() };
        let indices = { self.indices.lock().await.clone() };
        let documents = { self.documents.lock().await.clone() };
        let counter = { *self.counter.lock().await };

        let cached_docs: BTreeMap<String, Document> = documents
            .into_iter()
            .map(|(id, doc)| (id.to_string(), doc))
            .collect();
        Ok(json!({
            "archive_dir": self.archive.root().to_string_lossy(),
            "enable_cache": self.cached,
            "auto_increment": counter,
            "vectors": vectors,
            "inverted_indices": indices,
            "cached_docs": cached_docs,
        }))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn scored_all(
        &self,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<Scored>> {
        self.check_shape(vector)?;
        let keys: Vec<String> = {
            let vectors = self.vectors.lock().await;
            vectors.keys().cloned().collect()
        };
        Ok(score(keys, vector, metric, top_k))
    }

    async fn scored_filtered(
        &self,
        query: &str,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<Scored>> {
        self.check_shape(vector)?;
        let keys: Vec<String> = {
            // V before I; the filter's match set is re-ordered by the vector
            // table so tie-breaking stays deterministic.
            let vectors = self.vectors.lock().await;
            let indices = self.indices.lock().await;
            let matched = dsl::evaluate(query, &indices)?;
            vectors
                .keys()
                .filter(|k| matched.contains(*k))
                .cloned()
                .collect()
        };
        Ok(score(keys, vector, metric, top_k))
    }

    async fn resolve_documents(
        &self,
        scored: Vec<Scored>,
        cached: bool,
    ) -> Result<Vec<(Document, f64)>> {
        let vectors = self.vectors.lock().await;
        let mut documents = self.documents.lock().await;
        let mut out = Vec::with_capacity(scored.len());
        for hit in scored {
            let Some(&id) = vectors.get(&hit.key) else {
                // The record vanished between scoring and resolution.
                return Err(DbError::VectorNotExist(hit.key));
            };
            let doc =
                fetch_document(&self.archive, &mut documents, id, self.cached || cached).await?;
            out.push((doc, hit.distance));
        }
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lock-free helpers (the guards' targets are passed in; nothing here locks)
// ─────────────────────────────────────────────────────────────────────────────

/// Score every key against the query and keep the `top_k` nearest.
fn score(keys: Vec<String>, query: &[f64], metric: Metric, top_k: usize) -> Vec<Scored> {
    let mut scored: Vec<Scored> = keys
        .into_par_iter()
        .filter_map(|key| {
            let stored: Vec<f64> = serde_json::from_str(&key).ok()?;
            let distance = metric.distance(&stored, query);
            Some(Scored { key, distance })
        })
        .collect();
    // Stable sort: equal distances keep the vector table's insertion order.
    scored.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

fn materialize(hit: Scored) -> Option<(Vec<f64>, f64)> {
    let vector: Vec<f64> = serde_json::from_str(&hit.key).ok()?;
    Some((vector, hit.distance))
}

/// Fetch a document body, preferring the cache, reading the file otherwise.
/// The body is cached when the engine is fully cached or the caller asks.
async fn fetch_document(
    archive: &Archive,
    documents: &mut HashMap<u64, Document>,
    id: u64,
    cache_it: bool,
) -> Result<Document> {
    if let Some(doc) = documents.get(&id) {
        return Ok(doc.clone());
    }
    let doc = archive.read_document(id).await?;
    if cache_it {
        documents.insert(id, doc.clone());
    }
    Ok(doc)
}

/// Populate an index for `field` from every live record's document.
async fn build_index(
    archive: &Archive,
    field: &str,
    vectors: &VectorTable,
    documents: &mut HashMap<u64, Document>,
    cache_it: bool,
) -> Result<Index> {
    let mut index = Index::new();
    for (vk, id) in vectors {
        let doc = fetch_document(archive, documents, *id, cache_it).await?;
        if let Some(value) = doc.get(field) {
            index.insert(vk.clone(), value.clone());
        }
    }
    Ok(index)
}

// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    async fn engine(tmp: &TempDir) -> Dipamkara {
        Dipamkara::open(3, tmp.path().join("db"), false).await.unwrap()
    }

    #[tokio::test]
    async fn create_rejects_wrong_dimension() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let err = db
            .create(&[1.0, 2.0], doc(&[]), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VectorShape(_)));
    }

    #[tokio::test]
    async fn create_rejects_nan() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let err = db
            .create(&[1.0, f64::NAN, 0.0], doc(&[]), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VectorShape(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_key() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        assert!(db.create(&[1.0, 0.0, 0.0], doc(&[]), &[], false).await.unwrap());
        let err = db
            .create(&[1.0, 0.0, 0.0], doc(&[]), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VectorExists(_)));
    }

    #[tokio::test]
    async fn create_rejects_operator_in_index_name() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let err = db
            .create(
                &[1.0, 0.0, 0.0],
                doc(&[("a", json!(1))]),
                &["a&&b".to_string()],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::IndexName(..)));
    }

    #[tokio::test]
    async fn create_rejects_index_missing_from_document() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let err = db
            .create(
                &[1.0, 0.0, 0.0],
                doc(&[("a", json!(1))]),
                &["missing".to_string()],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::IndexNotExist(_)));
    }

    /// Document ids survive deletions: never reused, strictly monotonic.
    #[tokio::test]
    async fn document_ids_are_never_reused() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        db.create(&[1.0, 0.0, 0.0], doc(&[]), &[], false).await.unwrap();
        db.create(&[0.0, 1.0, 0.0], doc(&[]), &[], false).await.unwrap();
        assert!(db.remove_by_vector(&[1.0, 0.0, 0.0], true).await.unwrap());
        db.create(&[0.0, 0.0, 1.0], doc(&[]), &[], false).await.unwrap();

        let insight = db.insight().await.unwrap();
        assert_eq!(insight["auto_increment"], json!(3));
        let vectors = insight["vectors"].as_object().unwrap();
        let ids: HashSet<u64> = vectors.values().map(|v| v.as_u64().unwrap()).collect();
        assert_eq!(ids.len(), vectors.len(), "no two records share an id");
        assert!(ids.iter().all(|id| *id < 3));
    }

    #[tokio::test]
    async fn remove_absent_vector_is_false_not_error() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        assert!(!db.remove_by_vector(&[1.0, 0.0, 0.0], true).await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_is_true_for_cached_and_uncached() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let v = [1.0, 0.0, 0.0];
        db.create(&v, doc(&[("a", json!(1))]), &[], true).await.unwrap();
        // cached body present → evicted
        assert!(db.invalidate_cached_doc_by_vector(&v).await.unwrap());
        // already uncached → still true
        assert!(db.invalidate_cached_doc_by_vector(&v).await.unwrap());
        // unknown vector → error
        let err = db
            .invalidate_cached_doc_by_vector(&[0.0, 1.0, 0.0])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::VectorNotExist(_)));
    }

    #[tokio::test]
    async fn mod_doc_requires_existing_field() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let v = [1.0, 0.0, 0.0];
        db.create(&v, doc(&[("age", json!(30))]), &[], false).await.unwrap();
        let err = db
            .mod_doc_by_vector(&v, "height", json!(180))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::FieldNotExist(_)));
    }

    #[tokio::test]
    async fn create_index_then_remove_restores_indices() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        db.create(&[1.0, 0.0, 0.0], doc(&[("age", json!(30))]), &[], false)
            .await
            .unwrap();

        let before = db.insight().await.unwrap()["inverted_indices"].clone();
        let built = db.create_index("age").await.unwrap();
        assert_eq!(built.len(), 1);
        assert!(db.remove_index("age").await.unwrap());
        let after = db.insight().await.unwrap()["inverted_indices"].clone();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn create_index_twice_fails() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        db.create(&[1.0, 0.0, 0.0], doc(&[("age", json!(30))]), &[], false)
            .await
            .unwrap();
        db.create_index("age").await.unwrap();
        assert!(matches!(
            db.create_index("age").await,
            Err(DbError::IndexExists(_))
        ));
    }
}

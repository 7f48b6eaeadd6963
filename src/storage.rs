//! # Dipamkara — On-disk archive
//!
//! Layout under the database root:
//!
//! ```text
//! <root>/.vec    JSON object: vector key → document id
//! <root>/.inv    JSON object: index name → { vector key → value }
//! <root>/zen/    one UTF-8 JSON file per document, named by decimal id
//! ```
//!
//! Document files are the primary record and are written synchronously inline
//! with the mutation that produces them, then verified by re-read. `.vec` and
//! `.inv` are full-overwrite snapshots, written via temp-file-plus-rename so a
//! crash can never leave a torn snapshot behind.
//!
//! All IO is `tokio::fs`: callers hold engine locks across these awaits and
//! must never block the executor.

use crate::dsl::Indices;
use crate::error::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A document body: free-form field → JSON value.
pub type Document = serde_json::Map<String, Value>;

/// The live-vector table as persisted in `.vec`.
pub type VectorTable = IndexMap<String, u64>;

const VEC_FILE: &str = ".vec";
const INV_FILE: &str = ".inv";
const ZEN_DIR: &str = "zen";

/// Handle to one database directory.
#[derive(Debug, Clone)]
pub struct Archive {
    root: PathBuf,
    vec_path: PathBuf,
    inv_path: PathBuf,
    zen_dir: PathBuf,
}

impl Archive {
    /// Open (creating if absent) the archive layout under `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let archive = Self {
            vec_path: root.join(VEC_FILE),
            inv_path: root.join(INV_FILE),
            zen_dir: root.join(ZEN_DIR),
            root,
        };
        tokio::fs::create_dir_all(&archive.zen_dir).await?;
        Ok(archive)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the `.vec` snapshot. Missing or empty file means an empty table.
    pub async fn load_vectors(&self) -> Result<VectorTable> {
        match read_if_nonempty(&self.vec_path).await? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(VectorTable::new()),
        }
    }

    /// Load the `.inv` snapshot. Missing or empty file means no indices.
    pub async fn load_indices(&self) -> Result<Indices> {
        match read_if_nonempty(&self.inv_path).await? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Indices::new()),
        }
    }

    /// Overwrite `.vec` with the given table.
    pub async fn snapshot_vectors(&self, table: &VectorTable) -> Result<()> {
        write_atomic(&self.vec_path, serde_json::to_string(table)?.as_bytes()).await
    }

    /// Overwrite `.inv` with the given indices.
    pub async fn snapshot_indices(&self, indices: &Indices) -> Result<()> {
        write_atomic(&self.inv_path, serde_json::to_string(indices)?.as_bytes()).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document files
    // ─────────────────────────────────────────────────────────────────────────

    pub fn document_path(&self, id: u64) -> PathBuf {
        self.zen_dir.join(id.to_string())
    }

    /// Write the document for `id` and verify the bytes by re-reading.
    ///
    /// Returns `false` when the verification read does not match what was
    /// written; the caller decides whether to delete the file.
    pub async fn write_document(&self, id: u64, doc: &Document) -> Result<bool> {
        let path = self.document_path(id);
        let bytes = serde_json::to_vec(doc)?;
        tokio::fs::write(&path, &bytes).await?;
        let echo = tokio::fs::read(&path).await?;
        Ok(echo == bytes)
    }

    pub async fn read_document(&self, id: u64) -> Result<Document> {
        let text = tokio::fs::read_to_string(self.document_path(id)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Best-effort delete; a missing file is not an error.
    pub async fn remove_document(&self, id: u64) {
        let path = self.document_path(id);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(id, error = %err, "failed to delete document file");
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Startup scan
    // ─────────────────────────────────────────────────────────────────────────

    /// Every document id present under `zen/`, orphans included.
    ///
    /// Non-numeric entries (editor droppings, temp files) are skipped.
    pub async fn scan_document_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.zen_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u64>().ok())
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Delete document files whose id is not in `live`.
    ///
    /// A crash between a document write and the next `.vec` snapshot leaves
    /// such orphans behind; they are unreachable and must not resurrect.
    pub async fn remove_orphans(&self, live: &HashSet<u64>) -> Result<usize> {
        let mut removed = 0;
        for id in self.scan_document_ids().await? {
            if !live.contains(&id) {
                debug!(id, "removing orphan document file");
                self.remove_document(id).await;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn read_if_nonempty(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) if text.is_empty() => Ok(None),
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────

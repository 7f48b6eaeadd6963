//! # Dipamkara — Wire protocol
//!
//! A *frame* is an arbitrary payload followed by a configurable EOF marker
//! (default `<eof>`). Payloads are JSON, so the default marker can never
//! occur inside one.
//!
//! Request envelope:
//!
//! ```text
//! { "db_engine": "dipamkara",
//!   "opt":       "insight" | "create" | "read" | "update" | "delete" | "save",
//!   "cmd":       <operation name>,
//!   "param":     <object, optional> }
//! ```
//!
//! Reply envelope:
//!
//! ```text
//! { "state": "OK" | "Exception", "message": <string>, "data": <JSON> }
//! ```
//!
//! Exactly one reply frame per request frame; the server closes the
//! connection afterwards.

use crate::engine::Dipamkara;
use crate::error::{DbError, Result};
use crate::metric::Metric;
use crate::storage::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The only engine identifier this server dispatches for.
pub const ENGINE_NAME: &str = "dipamkara";

/// Default frame terminator.
pub const DEFAULT_EOF: &str = "<eof>";

// ─────────────────────────────────────────────────────────────────────────────
// Envelopes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Request {
    pub db_engine: String,
    pub opt: String,
    pub cmd: String,
    #[serde(default)]
    pub param: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyState {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "Exception")]
    Exception,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Reply {
    pub state: ReplyState,
    pub message: String,
    pub data: Value,
}

impl Reply {
    pub fn ok(data: Value) -> Self {
        Self {
            state: ReplyState::Ok,
            message: String::new(),
            data,
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self {
            state: ReplyState::Exception,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.state == ReplyState::Ok
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Frame codec
// ─────────────────────────────────────────────────────────────────────────────

/// Read one frame: accumulate chunks of `buffer_size` bytes until the EOF
/// marker appears, then return the payload with the marker stripped.
///
/// `timeout` bounds each individual read; a stalled peer yields
/// [`DbError::ReadTimeout`].
pub async fn read_frame<R>(
    reader: &mut R,
    eof: &[u8],
    buffer_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::new();
    let mut chunk = vec![0u8; buffer_size.max(1)];
    loop {
        let n = tokio::time::timeout(timeout, reader.read(&mut chunk))
            .await
            .map_err(|_| DbError::ReadTimeout)??;
        if n == 0 {
            return Err(DbError::ProtocolDecode(
                "connection closed before frame terminator".to_string(),
            ));
        }
        frame.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_marker(&frame, eof) {
            frame.truncate(pos);
            return Ok(frame);
        }
    }
}

/// Write one frame: the payload followed by the EOF marker.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], eof: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.write_all(eof).await?;
    writer.flush().await?;
    Ok(())
}

fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || haystack.len() < marker.len() {
        return None;
    }
    haystack.windows(marker.len()).position(|w| w == marker)
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Decode one request payload, run it against the engine, and build the
/// reply. Every error becomes an `Exception` reply; nothing panics the
/// connection task.
pub async fn dispatch(engine: &Dipamkara, raw: &[u8]) -> Reply {
    match handle(engine, raw).await {
        Ok(data) => Reply::ok(data),
        Err(err) => Reply::exception(err.to_string()),
    }
}

async fn handle(engine: &Dipamkara, raw: &[u8]) -> Result<Value> {
    let request: Request = serde_json::from_slice(raw)
        .map_err(|err| DbError::ProtocolDecode(err.to_string()))?;
    if request.db_engine != ENGINE_NAME {
        return Err(DbError::EngineNotSupported(request.db_engine));
    }
    let params = Params(&request.param);

    match (request.opt.as_str(), request.cmd.as_str()) {
        ("insight", "insight") => engine.insight().await,

        ("create", "create") => {
            let vector = params.vector("vector")?;
            let document = params.document("document")?;
            let indices = params.string_list("indices")?;
            let cached = params.bool_or("cached", false)?;
            let created = engine.create(&vector, document, &indices, cached).await?;
            Ok(Value::Bool(created))
        }
        ("create", "create_index") => {
            let index = params.string("index")?;
            let built = engine.create_index(&index).await?;
            Ok(serde_json::to_value(built)?)
        }

        ("save", "save") => {
            let saved = engine.save().await?;
            Ok(Value::Bool(saved))
        }

        ("delete", "invalidate_cached_doc_by_vector") => {
            let vector = params.vector("vector")?;
            let done = engine.invalidate_cached_doc_by_vector(&vector).await?;
            Ok(Value::Bool(done))
        }
        ("delete", "remove_by_vector") => {
            let vector = params.vector("vector")?;
            let removed = engine.remove_by_vector(&vector, true).await?;
            Ok(Value::Bool(removed))
        }
        ("delete", "indexed_remove") => {
            let query = params.string("query")?;
            let done = engine.indexed_remove(&query).await?;
            Ok(Value::Bool(done))
        }
        ("delete", "remove_index") => {
            let index = params.string("index")?;
            let removed = engine.remove_index(&index).await?;
            Ok(Value::Bool(removed))
        }

        ("update", "mod_doc_by_vector") => {
            let vector = params.vector("vector")?;
            let key = params.string("key")?;
            let value = params.raw("value")?;
            let done = engine.mod_doc_by_vector(&vector, &key, value).await?;
            Ok(Value::Bool(done))
        }

        ("read", "vector_query") => {
            let (vector, metric, top_k) = params.query_triple()?;
            let hits = engine.vector_query(&vector, metric, top_k).await?;
            Ok(serde_json::to_value(hits)?)
        }
        ("read", "indexed_vector_query") => {
            let query = params.string("query")?;
            let (vector, metric, top_k) = params.query_triple()?;
            let hits = engine
                .indexed_vector_query(&query, &vector, metric, top_k)
                .await?;
            Ok(serde_json::to_value(hits)?)
        }
        ("read", "find_documents_by_vector") => {
            let (vector, metric, top_k) = params.query_triple()?;
            let cached = params.bool_or("cached", false)?;
            let hits: Vec<(Document, f64)> = engine
                .find_documents_by_vector(&vector, metric, top_k, cached)
                .await?;
            Ok(serde_json::to_value(hits)?)
        }
        ("read", "find_documents_by_vector_indexed") => {
            let query = params.string("query")?;
            let (vector, metric, top_k) = params.query_triple()?;
            let cached = params.bool_or("cached", false)?;
            let hits: Vec<(Document, f64)> = engine
                .find_documents_by_vector_indexed(&query, &vector, metric, top_k, cached)
                .await?;
            Ok(serde_json::to_value(hits)?)
        }

        (opt, cmd) => Err(DbError::ProtocolDecode(format!(
            "unknown operation {opt}/{cmd}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter extraction
// ─────────────────────────────────────────────────────────────────────────────

struct Params<'a>(&'a Value);

impl Params<'_> {
    fn get(&self, key: &str) -> Result<&Value> {
        self.0
            .get(key)
            .ok_or_else(|| DbError::ProtocolDecode(format!("missing parameter \"{key}\"")))
    }

    fn raw(&self, key: &str) -> Result<Value> {
        self.get(key).cloned()
    }

    fn vector(&self, key: &str) -> Result<Vec<f64>> {
        serde_json::from_value(self.get(key)?.clone())
            .map_err(|_| DbError::ProtocolDecode(format!("\"{key}\" must be an array of numbers")))
    }

    fn document(&self, key: &str) -> Result<Document> {
        serde_json::from_value(self.get(key)?.clone())
            .map_err(|_| DbError::ProtocolDecode(format!("\"{key}\" must be an object")))
    }

    fn string(&self, key: &str) -> Result<String> {
        self.get(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DbError::ProtocolDecode(format!("\"{key}\" must be a string")))
    }

    /// Optional list of index names; absent means none.
    fn string_list(&self, key: &str) -> Result<Vec<String>> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|_| {
                DbError::ProtocolDecode(format!("\"{key}\" must be an array of strings"))
            }),
        }
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(DbError::ProtocolDecode(format!(
                "\"{key}\" must be a boolean"
            ))),
        }
    }

    fn usize(&self, key: &str) -> Result<usize> {
        self.get(key)?
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                DbError::ProtocolDecode(format!("\"{key}\" must be a nonnegative integer"))
            })
    }

    /// The `(vector, metric_value, top_k)` triple shared by all read ops.
    fn query_triple(&self) -> Result<(Vec<f64>, Metric, usize)> {
        let vector = self.vector("vector")?;
        let metric = Metric::parse(&self.string("metric_value")?)?;
        let top_k = self.usize("top_k")?;
        Ok((vector, metric, top_k))
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn reply_state_uses_wire_names() {
        let ok = serde_json::to_value(Reply::ok(Value::Bool(true))).unwrap();
        assert_eq!(ok["state"], "OK");
        assert_eq!(ok["message"], "");
        let exc = serde_json::to_value(Reply::exception("boom")).unwrap();
        assert_eq!(exc["state"], "Exception");
        assert_eq!(exc["data"], Value::Null);
    }

    #[tokio::test]
    async fn frame_round_trips_across_small_chunks() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let payload = br#"{"hello":"world","padding":"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"}"#;
        write_frame(&mut client, payload, b"<eof>").await.unwrap();

        // A 7-byte buffer forces the marker to straddle chunk boundaries.
        let frame = read_frame(&mut server, b"<eof>", 7, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(frame, payload);
    }

    #[tokio::test]
    async fn read_frame_times_out_on_silent_peer() {
        let (_client, mut server) = tokio::io::duplex(64);
        let err = read_frame(&mut server, b"<eof>", 16, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ReadTimeout));
    }

    #[tokio::test]
    async fn read_frame_rejects_early_close() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let err = read_frame(&mut server, b"<eof>", 16, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ProtocolDecode(_)));
    }

    async fn engine(tmp: &TempDir) -> Dipamkara {
        Dipamkara::open(3, tmp.path().join("db"), false).await.unwrap()
    }

    #[tokio::test]
    async fn dispatch_create_then_query() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;

        let create = serde_json::to_vec(&json!({
            "db_engine": "dipamkara",
            "opt": "create",
            "cmd": "create",
            "param": {
                "vector": [1.0, 0.0, 0.0],
                "document": {"age": 30},
                "indices": [],
                "cached": false
            }
        }))
        .unwrap();
        let reply = dispatch(&db, &create).await;
        assert!(reply.is_ok(), "create failed: {}", reply.message);
        assert_eq!(reply.data, Value::Bool(true));

        let query = serde_json::to_vec(&json!({
            "db_engine": "dipamkara",
            "opt": "read",
            "cmd": "vector_query",
            "param": {
                "vector": [1.0, 0.0, 0.0],
                "metric_value": "cosine",
                "top_k": 1
            }
        }))
        .unwrap();
        let reply = dispatch(&db, &query).await;
        assert!(reply.is_ok());
        let hits = reply.data.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0][0], json!([1.0, 0.0, 0.0]));
        assert!(hits[0][1].as_f64().unwrap().abs() < 1e-9);
    }

    #[tokio::test]
    async fn dispatch_rejects_malformed_envelope() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let reply = dispatch(&db, b"not json at all").await;
        assert_eq!(reply.state, ReplyState::Exception);
        assert!(reply.message.contains("protocol decode"));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_engine() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let raw = serde_json::to_vec(&json!({
            "db_engine": "other", "opt": "insight", "cmd": "insight"
        }))
        .unwrap();
        let reply = dispatch(&db, &raw).await;
        assert_eq!(reply.state, ReplyState::Exception);
        assert!(reply.message.contains("not supported"));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_operation() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let raw = serde_json::to_vec(&json!({
            "db_engine": "dipamkara", "opt": "read", "cmd": "drop_everything"
        }))
        .unwrap();
        let reply = dispatch(&db, &raw).await;
        assert_eq!(reply.state, ReplyState::Exception);
        assert!(reply.message.contains("unknown operation"));
    }

    #[tokio::test]
    async fn dispatch_reports_missing_parameter() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let raw = serde_json::to_vec(&json!({
            "db_engine": "dipamkara", "opt": "delete", "cmd": "remove_by_vector",
            "param": {}
        }))
        .unwrap();
        let reply = dispatch(&db, &raw).await;
        assert_eq!(reply.state, ReplyState::Exception);
        assert!(reply.message.contains("vector"));
    }

    #[tokio::test]
    async fn dispatch_rejects_unknown_metric() {
        let tmp = TempDir::new().unwrap();
        let db = engine(&tmp).await;
        let raw = serde_json::to_vec(&json!({
            "db_engine": "dipamkara", "opt": "read", "cmd": "vector_query",
            "param": {"vector": [0.0, 0.0, 0.0], "metric_value": "manhattan", "top_k": 1}
        }))
        .unwrap();
        let reply = dispatch(&db, &raw).await;
        assert_eq!(reply.state, ReplyState::Exception);
        assert!(reply.message.contains("unsupported metric"));
    }
}

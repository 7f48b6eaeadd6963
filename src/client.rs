//! # Dipamkara — Client
//!
//! Speaks the framed protocol the naive way: one connection per request,
//! because the server closes the connection after every reply. A typed
//! method per operation builds the envelope, sends it, and unwraps the
//! reply; an `Exception` reply surfaces as [`DbError::Remote`].

use crate::dsl::Index;
use crate::error::{DbError, Result};
use crate::metric::Metric;
use crate::protocol::{read_frame, write_frame, Reply, DEFAULT_EOF, ENGINE_NAME};
use crate::storage::Document;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;

pub struct DbClient {
    addr: String,
    eof: Vec<u8>,
    buffer_size: usize,
    timeout: Duration,
}

impl DbClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            eof: DEFAULT_EOF.as_bytes().to_vec(),
            buffer_size: 256,
            timeout: Duration::from_secs(4),
        }
    }

    pub fn with_eof(mut self, eof: impl Into<Vec<u8>>) -> Self {
        self.eof = eof.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one request envelope and wait for the single reply frame.
    pub async fn request(&self, envelope: &Value) -> Result<Reply> {
        let mut stream = TcpStream::connect(&self.addr).await?;
        write_frame(&mut stream, &serde_json::to_vec(envelope)?, &self.eof).await?;
        let frame = read_frame(&mut stream, &self.eof, self.buffer_size, self.timeout).await?;
        serde_json::from_slice(&frame)
            .map_err(|err| DbError::ProtocolDecode(format!("bad reply envelope: {err}")))
    }

    /// Request, then unwrap: `Exception` replies become [`DbError::Remote`].
    async fn call(&self, opt: &str, cmd: &str, param: Value) -> Result<Value> {
        let mut envelope = json!({
            "db_engine": ENGINE_NAME,
            "opt": opt,
            "cmd": cmd,
        });
        if !param.is_null() {
            envelope["param"] = param;
        }
        let reply = self.request(&envelope).await?;
        if reply.is_ok() {
            Ok(reply.data)
        } else {
            Err(DbError::Remote(reply.message))
        }
    }

    async fn call_bool(&self, opt: &str, cmd: &str, param: Value) -> Result<bool> {
        self.call(opt, cmd, param)
            .await?
            .as_bool()
            .ok_or_else(|| DbError::ProtocolDecode("expected boolean reply data".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed operations
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn insight(&self) -> Result<Value> {
        self.call("insight", "insight", Value::Null).await
    }

    pub async fn create(
        &self,
        vector: &[f64],
        document: &Document,
        indices: &[String],
        cached: bool,
    ) -> Result<bool> {
        self.call_bool(
            "create",
            "create",
            json!({
                "vector": vector,
                "document": document,
                "indices": indices,
                "cached": cached,
            }),
        )
        .await
    }

    pub async fn create_index(&self, index: &str) -> Result<Index> {
        let data = self
            .call("create", "create_index", json!({ "index": index }))
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn save(&self) -> Result<bool> {
        self.call_bool("save", "save", Value::Null).await
    }

    pub async fn invalidate_cached_doc_by_vector(&self, vector: &[f64]) -> Result<bool> {
        self.call_bool(
            "delete",
            "invalidate_cached_doc_by_vector",
            json!({ "vector": vector }),
        )
        .await
    }

    pub async fn remove_by_vector(&self, vector: &[f64]) -> Result<bool> {
        self.call_bool("delete", "remove_by_vector", json!({ "vector": vector }))
            .await
    }

    pub async fn indexed_remove(&self, query: &str) -> Result<bool> {
        self.call_bool("delete", "indexed_remove", json!({ "query": query }))
            .await
    }

    pub async fn remove_index(&self, index: &str) -> Result<bool> {
        self.call_bool("delete", "remove_index", json!({ "index": index }))
            .await
    }

    pub async fn mod_doc_by_vector(&self, vector: &[f64], key: &str, value: Value) -> Result<bool> {
        self.call_bool(
            "update",
            "mod_doc_by_vector",
            json!({ "vector": vector, "key": key, "value": value }),
        )
        .await
    }

    pub async fn vector_query(
        &self,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        let data = self
            .call(
                "read",
                "vector_query",
                json!({
                    "vector": vector,
                    "metric_value": metric.as_str(),
                    "top_k": top_k,
                }),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn indexed_vector_query(
        &self,
        query: &str,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
    ) -> Result<Vec<(Vec<f64>, f64)>> {
        let data = self
            .call(
                "read",
                "indexed_vector_query",
                json!({
                    "query": query,
                    "vector": vector,
                    "metric_value": metric.as_str(),
                    "top_k": top_k,
                }),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn find_documents_by_vector(
        &self,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
        cached: bool,
    ) -> Result<Vec<(Document, f64)>> {
        let data = self
            .call(
                "read",
                "find_documents_by_vector",
                json!({
                    "vector": vector,
                    "metric_value": metric.as_str(),
                    "top_k": top_k,
                    "cached": cached,
                }),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    pub async fn find_documents_by_vector_indexed(
        &self,
        query: &str,
        vector: &[f64],
        metric: Metric,
        top_k: usize,
        cached: bool,
    ) -> Result<Vec<(Document, f64)>> {
        let data = self
            .call(
                "read",
                "find_documents_by_vector_indexed",
                json!({
                    "query": query,
                    "vector": vector,
                    "metric_value": metric.as_str(),
                    "top_k": top_k,
                    "cached": cached,
                }),
            )
            .await?;
        Ok(serde_json::from_value(data)?)
    }
}

//! # Dipamkara — Error kinds
//!
//! One variant per user-visible failure. The wire layer renders every variant
//! into an `Exception` reply via `Display`; tests match on the variant itself.

use thiserror::Error;

/// Every way an engine or protocol operation can fail.
#[derive(Debug, Error)]
pub enum DbError {
    /// Vector length does not match the configured dimension, or the vector
    /// contains non-finite components.
    #[error("vector shape: {0}")]
    VectorShape(String),

    /// `create` with a vector key that is already live.
    #[error("vector {0} already exists")]
    VectorExists(String),

    /// An operation referenced a vector key that is not live.
    #[error("vector {0} not exists")]
    VectorNotExist(String),

    /// `create_index` on an index that is already built.
    #[error("index \"{0}\" exists")]
    IndexExists(String),

    /// An operation or filter atom referenced an unknown (or empty) index.
    #[error("index \"{0}\" not exists")]
    IndexNotExist(String),

    /// An index name contains a reserved filter operator token.
    #[error("index name \"{0}\" contains reserved token \"{1}\"")]
    IndexName(String, &'static str),

    /// `mod_doc_by_vector` on a key the document does not contain.
    #[error("key \"{0}\" not exists")]
    FieldNotExist(String),

    /// Unknown metric name on a query.
    #[error("unsupported metric: {0}")]
    MetricNotSupported(String),

    /// Malformed filter expression.
    #[error("filter syntax: {0}")]
    DslSyntax(String),

    /// Unknown `db_engine` identifier.
    #[error("db engine \"{0}\" not supported")]
    EngineNotSupported(String),

    /// Malformed request envelope or missing required parameter.
    #[error("protocol decode: {0}")]
    ProtocolDecode(String),

    /// No complete frame arrived within the configured read timeout.
    #[error("frame read timed out")]
    ReadTimeout,

    /// The server answered with an `Exception` reply (client side only).
    #[error("remote exception: {0}")]
    Remote(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

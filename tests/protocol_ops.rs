//! # Dispatcher coverage
//!
//! Drives every `(opt, cmd)` pair straight through the dispatcher against a
//! real engine over a throwaway archive, checking both the success payloads
//! and the Exception texts clients key on.

use dipamkara::engine::Dipamkara;
use dipamkara::protocol::{dispatch, Reply};
use serde_json::{json, Value};
use tempfile::TempDir;

async fn open(tmp: &TempDir) -> Dipamkara {
    Dipamkara::open(3, tmp.path().join("db"), false)
        .await
        .expect("open engine")
}

async fn send(db: &Dipamkara, envelope: Value) -> Reply {
    dispatch(db, &serde_json::to_vec(&envelope).unwrap()).await
}

fn envelope(opt: &str, cmd: &str, param: Value) -> Value {
    let mut env = json!({"db_engine": "dipamkara", "opt": opt, "cmd": cmd});
    if !param.is_null() {
        env["param"] = param;
    }
    env
}

async fn seed(db: &Dipamkara) {
    for (vector, age, name) in [
        ([1.0, 0.0, 0.0], 20, "ada"),
        ([0.0, 1.0, 0.0], 30, "bob"),
        ([0.0, 0.0, 1.0], 40, "cora"),
    ] {
        let reply = send(
            db,
            envelope(
                "create",
                "create",
                json!({
                    "vector": vector,
                    "document": {"age": age, "name": name},
                    "indices": ["age"],
                    "cached": false
                }),
            ),
        )
        .await;
        assert!(reply.is_ok(), "seed create failed: {}", reply.message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_index_returns_populated_index() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(&db, envelope("create", "create_index", json!({"index": "name"}))).await;
    assert!(reply.is_ok(), "{}", reply.message);
    let entries = reply.data.as_object().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries["[1.0,0.0,0.0]"], json!("ada"));
}

#[tokio::test]
async fn remove_index_then_again_is_exception() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(&db, envelope("delete", "remove_index", json!({"index": "age"}))).await;
    assert!(reply.is_ok());
    assert_eq!(reply.data, json!(true));

    let reply = send(&db, envelope("delete", "remove_index", json!({"index": "age"}))).await;
    assert!(!reply.is_ok());
    assert!(reply.message.contains("not exists"), "{}", reply.message);
}

#[tokio::test]
async fn indexed_remove_prunes_matching_records() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(&db, envelope("delete", "indexed_remove", json!({"query": "age >= 30"}))).await;
    assert!(reply.is_ok(), "{}", reply.message);

    let insight = send(&db, envelope("insight", "insight", Value::Null)).await;
    let vectors = insight.data["vectors"].as_object().unwrap();
    assert_eq!(vectors.len(), 1);
    assert!(vectors.contains_key("[1.0,0.0,0.0]"));
}

#[tokio::test]
async fn mod_doc_updates_index_over_the_wire() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(
        &db,
        envelope(
            "update",
            "mod_doc_by_vector",
            json!({"vector": [1.0, 0.0, 0.0], "key": "age", "value": 21}),
        ),
    )
    .await;
    assert!(reply.is_ok(), "{}", reply.message);
    assert_eq!(reply.data, json!(true));

    let hits = send(
        &db,
        envelope(
            "read",
            "indexed_vector_query",
            json!({
                "query": "age == 21",
                "vector": [1.0, 0.0, 0.0],
                "metric_value": "chebyshev",
                "top_k": 10
            }),
        ),
    )
    .await;
    assert!(hits.is_ok());
    let hits = hits.data.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0][0], json!([1.0, 0.0, 0.0]));
}

#[tokio::test]
async fn invalidate_cached_doc_round_trip() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;

    let reply = send(
        &db,
        envelope(
            "create",
            "create",
            json!({
                "vector": [1.0, 0.0, 0.0],
                "document": {"age": 30},
                "indices": [],
                "cached": true
            }),
        ),
    )
    .await;
    assert!(reply.is_ok());

    let insight = send(&db, envelope("insight", "insight", Value::Null)).await;
    assert_eq!(insight.data["cached_docs"]["0"]["age"], json!(30));

    let reply = send(
        &db,
        envelope(
            "delete",
            "invalidate_cached_doc_by_vector",
            json!({"vector": [1.0, 0.0, 0.0]}),
        ),
    )
    .await;
    assert!(reply.is_ok());
    assert_eq!(reply.data, json!(true));

    let insight = send(&db, envelope("insight", "insight", Value::Null)).await;
    assert_eq!(insight.data["cached_docs"], json!({}));
}

#[tokio::test]
async fn remove_by_vector_reports_absence_as_false() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let param = json!({"vector": [1.0, 0.0, 0.0]});
    let reply = send(&db, envelope("delete", "remove_by_vector", param.clone())).await;
    assert!(reply.is_ok());
    assert_eq!(reply.data, json!(true));

    let reply = send(&db, envelope("delete", "remove_by_vector", param)).await;
    assert!(reply.is_ok());
    assert_eq!(reply.data, json!(false));
}

#[tokio::test]
async fn save_then_reopen_preserves_state() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("db");
    let before = {
        let db = Dipamkara::open(3, &path, false).await.unwrap();
        seed(&db).await;
        let reply = send(&db, envelope("save", "save", Value::Null)).await;
        assert!(reply.is_ok());
        assert_eq!(reply.data, json!(true));
        send(&db, envelope("insight", "insight", Value::Null)).await.data
    };

    let db = Dipamkara::open(3, &path, false).await.unwrap();
    let after = send(&db, envelope("insight", "insight", Value::Null)).await.data;
    assert_eq!(before["vectors"], after["vectors"]);
    assert_eq!(before["inverted_indices"], after["inverted_indices"]);
}

#[tokio::test]
async fn find_documents_by_vector_returns_pairs() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(
        &db,
        envelope(
            "read",
            "find_documents_by_vector",
            json!({
                "vector": [1.0, 0.0, 0.0],
                "metric_value": "euclidean",
                "top_k": 2,
                "cached": false
            }),
        ),
    )
    .await;
    assert!(reply.is_ok(), "{}", reply.message);
    let hits = reply.data.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0][0]["name"], json!("ada"));
    assert_eq!(hits[0][1], json!(0.0));
}

// ─────────────────────────────────────────────────────────────────────────────
// Exception texts
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_create_is_exception() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(
        &db,
        envelope(
            "create",
            "create",
            json!({"vector": [1.0, 0.0, 0.0], "document": {"age": 1}}),
        ),
    )
    .await;
    assert!(!reply.is_ok());
    assert!(reply.message.contains("already exists"), "{}", reply.message);
    assert_eq!(reply.data, Value::Null);
}

#[tokio::test]
async fn wrong_dimension_is_exception() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;

    let reply = send(
        &db,
        envelope(
            "create",
            "create",
            json!({"vector": [1.0, 0.0], "document": {}}),
        ),
    )
    .await;
    assert!(!reply.is_ok());
    assert!(reply.message.contains("vector shape"), "{}", reply.message);
}

#[tokio::test]
async fn bad_filter_syntax_is_exception() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(
        &db,
        envelope("delete", "indexed_remove", json!({"query": "age == unquoted"})),
    )
    .await;
    assert!(!reply.is_ok());
    assert!(reply.message.contains("filter syntax"), "{}", reply.message);
}

#[tokio::test]
async fn unknown_filter_index_is_exception() {
    let tmp = TempDir::new().unwrap();
    let db = open(&tmp).await;
    seed(&db).await;

    let reply = send(
        &db,
        envelope("delete", "indexed_remove", json!({"query": "height > 10"})),
    )
    .await;
    assert!(!reply.is_ok());
    assert!(reply.message.contains("not exists"), "{}", reply.message);
}

//! HTTP contract tests: routing, status mapping, and error bodies.
//!
//! Run with `cargo test --features web-api`.

#![cfg(feature = "web-api")]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chunkgraph::{
    http, ChunkRecord, FixedFlags, GraphDataService, InMemoryCorpus, ServiceConfig,
    GRAPH_SCHEMA_VERSION,
};
use std::sync::Arc;
use tower::ServiceExt;

fn chunk(id: &str, doc: &str, embedding: &[f32]) -> ChunkRecord {
    ChunkRecord {
        id: id.into(),
        embedding: embedding.into(),
        label: format!("{doc}:{id}"),
        category: "prose".into(),
        document_id: doc.into(),
    }
}

fn test_router(enabled: bool) -> axum::Router {
    let corpus = Arc::new(InMemoryCorpus::new());
    corpus.insert_chunk(chunk("a", "d1", &[1.0, 0.0]));
    corpus.insert_chunk(chunk("b", "d1", &[0.9, 0.1]));
    corpus.insert_chunk(chunk("c", "d2", &[0.0, 1.0]));
    corpus.set_anchor("a", "tldr");
    corpus.set_anchor("b", "tldr");

    let service = Arc::new(GraphDataService::new(
        corpus.clone(),
        corpus.clone(),
        corpus,
        Arc::new(FixedFlags::new(enabled)),
        ServiceConfig::default(),
    ));
    http::router(service)
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

#[tokio::test]
async fn test_health_reports_schema_version() {
    let (status, body) = get(test_router(true), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["schema_version"], GRAPH_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_graph_data_happy_path() {
    let (status, body) = get(test_router(true), "/graph-data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["v"], GRAPH_SCHEMA_VERSION);
    assert_eq!(body["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(body["truncated"], false);
    // Sanitized contract: node objects expose no embedding field
    for node in body["nodes"].as_array().unwrap() {
        assert!(node.get("embedding").is_none());
        assert_eq!(node["coords"].as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn test_graph_data_query_filters_apply() {
    let (status, body) = get(
        test_router(true),
        "/graph-data?document_filter=d1&relation_types=anchor",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a", "b"]);

    let edges = body["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["type"], "anchor");
}

#[tokio::test]
async fn test_unknown_relation_type_is_bad_request() {
    let (status, body) = get(test_router(true), "/graph-data?relation_types=semantic").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
    assert_eq!(body["code"], "CGR-VAL-001");
    assert_eq!(body["execution_id"].as_str().unwrap().len(), 16);
    assert!(body.get("nodes").is_none(), "error bodies carry no graph data");
}

#[tokio::test]
async fn test_invalid_max_nodes_is_bad_request() {
    let (status, body) = get(test_router(true), "/graph-data?max_nodes=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_disabled_flag_is_forbidden() {
    let (status, body) = get(test_router(false), "/graph-data").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "feature_disabled");
    assert_eq!(body["code"], "CGR-FLAG-001");
}

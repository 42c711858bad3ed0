//! Single-flight and cache-invalidation behavior of the service.
//!
//! The central correctness property: N concurrent identical requests
//! against a cold cache run exactly one projection computation, and a
//! corpus change (new snapshot token) forces exactly one fresh one.

use chunkgraph::{
    ChunkRecord, FixedFlags, GraphDataService, GraphRequest, InMemoryCorpus, ServiceConfig,
};
use std::sync::Arc;
use tokio::sync::Barrier;

fn chunk(id: &str, embedding: &[f32]) -> ChunkRecord {
    ChunkRecord {
        id: id.into(),
        embedding: embedding.into(),
        label: format!("doc.md:{id}"),
        category: "prose".into(),
        document_id: "doc".into(),
    }
}

fn populated_corpus() -> Arc<InMemoryCorpus> {
    let corpus = Arc::new(InMemoryCorpus::new());
    corpus.insert_chunk(chunk("a", &[1.0, 0.0, 0.2]));
    corpus.insert_chunk(chunk("b", &[0.8, 0.1, 0.1]));
    corpus.insert_chunk(chunk("c", &[0.0, 1.0, 0.0]));
    corpus.insert_chunk(chunk("d", &[0.1, 0.9, 0.3]));
    corpus
}

fn service_over(corpus: Arc<InMemoryCorpus>) -> Arc<GraphDataService> {
    Arc::new(GraphDataService::new(
        corpus.clone(),
        corpus.clone(),
        corpus,
        Arc::new(FixedFlags::new(true)),
        ServiceConfig::default(),
    ))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_cold_requests_run_one_projection() {
    let service = service_over(populated_corpus());
    let concurrency = 100;
    let barrier = Arc::new(Barrier::new(concurrency));

    let mut handles = Vec::with_capacity(concurrency);
    for _ in 0..concurrency {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.graph_data(&GraphRequest::default()).await
        }));
    }

    let mut payloads = Vec::with_capacity(concurrency);
    for handle in handles {
        payloads.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(
        service.projections_computed(),
        1,
        "all concurrent callers must share one projection flight"
    );

    // Every caller observed the same single result
    for payload in &payloads[1..] {
        assert_eq!(payload.nodes, payloads[0].nodes);
        assert_eq!(payload.edges, payloads[0].edges);
    }
}

#[tokio::test]
async fn test_warm_cache_serves_identical_coords_without_recompute() {
    let service = service_over(populated_corpus());
    let req = GraphRequest::default();

    let first = service.graph_data(&req).await.unwrap();
    let second = service.graph_data(&req).await.unwrap();

    assert_eq!(service.projections_computed(), 1);
    assert!(service.cache_stats().hits >= 1);

    for (a, b) in first.nodes.iter().zip(second.nodes.iter()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.coords, b.coords, "cached coords must be identical");
    }
}

#[tokio::test]
async fn test_corpus_change_triggers_fresh_projection() {
    let corpus = populated_corpus();
    let service = service_over(corpus.clone());
    let req = GraphRequest::default();

    service.graph_data(&req).await.unwrap();
    assert_eq!(service.projections_computed(), 1);

    // Unchanged corpus: cached projection is reused
    service.graph_data(&req).await.unwrap();
    assert_eq!(service.projections_computed(), 1);

    // A corpus change produces a new snapshot token; the stale entry is
    // never matched again and one fresh computation runs
    corpus.bump_revision();
    service.graph_data(&req).await.unwrap();
    assert_eq!(service.projections_computed(), 2);
}

#[tokio::test]
async fn test_distinct_node_sets_project_independently() {
    let corpus = populated_corpus();
    let service = service_over(corpus.clone());

    service
        .graph_data(&GraphRequest::default())
        .await
        .unwrap();
    service
        .graph_data(&GraphRequest {
            max_nodes: 2,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    // Different surviving node sets hash to different cache keys
    assert_eq!(service.projections_computed(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_warm_and_cold_requests_stay_coalesced() {
    let corpus = populated_corpus();
    let service = service_over(corpus.clone());
    let req = GraphRequest::default();

    // Warm the cache, then fire a concurrent burst
    service.graph_data(&req).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let service = Arc::clone(&service);
        let req = req.clone();
        handles.push(tokio::spawn(
            async move { service.graph_data(&req).await },
        ));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        service.projections_computed(),
        1,
        "warm cache must absorb the whole burst"
    );
}

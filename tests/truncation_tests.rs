//! Node truncation and edge-bounding behavior under `max_nodes`.

use chunkgraph::{
    ChunkRecord, FixedFlags, GraphDataService, GraphRequest, InMemoryCorpus, RelationType,
    ServiceConfig,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn chunk(id: &str, embedding: &[f32]) -> ChunkRecord {
    ChunkRecord {
        id: id.into(),
        embedding: embedding.into(),
        label: format!("doc.md:{id}"),
        category: "prose".into(),
        document_id: "doc".into(),
    }
}

fn service_over(corpus: Arc<InMemoryCorpus>) -> GraphDataService {
    GraphDataService::new(
        corpus.clone(),
        corpus.clone(),
        corpus,
        Arc::new(FixedFlags::new(true)),
        ServiceConfig::default(),
    )
}

fn only(kind: RelationType) -> BTreeSet<RelationType> {
    [kind].into_iter().collect()
}

#[tokio::test]
async fn test_truncation_respects_max_nodes_and_sets_flag() {
    let corpus = Arc::new(InMemoryCorpus::new());
    for i in 0..10 {
        let angle = i as f32 * 0.6;
        corpus.insert_chunk(chunk(&format!("n{i}"), &[angle.cos(), angle.sin(), 0.1]));
    }
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            max_nodes: 5,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(payload.nodes.len(), 5);
    assert!(payload.truncated);
    payload.check_invariants().unwrap();
}

#[tokio::test]
async fn test_no_truncation_flag_when_corpus_fits() {
    let corpus = Arc::new(InMemoryCorpus::new());
    corpus.insert_chunk(chunk("a", &[1.0, 0.0]));
    corpus.insert_chunk(chunk("b", &[0.0, 1.0]));
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            max_nodes: 100,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(payload.nodes.len(), 2);
    assert!(!payload.truncated);
}

#[tokio::test]
async fn test_truncation_keeps_highest_degree_nodes() {
    // Entity-only request so degrees are fully controlled: c, d, e form a
    // triangle (degree 2 each), a and b a lone pair (degree 1 each)
    let corpus = Arc::new(InMemoryCorpus::new());
    for id in ["a", "b", "c", "d", "e"] {
        corpus.insert_chunk(chunk(id, &[1.0, 0.5]));
    }
    corpus.set_entities("a", ["pair"]);
    corpus.set_entities("b", ["pair"]);
    corpus.set_entities("c", ["hub"]);
    corpus.set_entities("d", ["hub"]);
    corpus.set_entities("e", ["hub"]);
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            relation_types: only(RelationType::Entity),
            max_nodes: 3,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    let ids: Vec<&str> = payload.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "d", "e"]);
    assert!(payload.truncated);
    assert_eq!(payload.edges.len(), 3, "the kept triangle survives intact");
}

#[tokio::test]
async fn test_truncation_ties_break_by_ascending_id() {
    // Complete entity graph: every node has degree 3, so the first two ids
    // in ascending order must win
    let corpus = Arc::new(InMemoryCorpus::new());
    for id in ["p", "q", "r", "s"] {
        corpus.insert_chunk(chunk(id, &[0.3, 0.7]));
        corpus.set_entities(id, ["shared"]);
    }
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            relation_types: only(RelationType::Entity),
            max_nodes: 2,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    let ids: Vec<&str> = payload.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["p", "q"]);
}

#[tokio::test]
async fn test_truncation_drops_dangling_edges() {
    let corpus = Arc::new(InMemoryCorpus::new());
    for id in ["a", "b", "c", "d", "e"] {
        corpus.insert_chunk(chunk(id, &[1.0, 0.0, 0.3]));
    }
    corpus.set_entities("a", ["pair"]);
    corpus.set_entities("b", ["pair"]);
    corpus.set_entities("c", ["hub"]);
    corpus.set_entities("d", ["hub"]);
    corpus.set_entities("e", ["hub"]);
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            relation_types: only(RelationType::Entity),
            max_nodes: 3,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    let kept: BTreeSet<&str> = payload.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &payload.edges {
        assert!(kept.contains(edge.source.as_str()), "dangling source {edge:?}");
        assert!(kept.contains(edge.target.as_str()), "dangling target {edge:?}");
    }
}

#[tokio::test]
async fn test_edge_count_is_bounded_by_k_times_max_nodes() {
    // 12 nodes all sharing one entity: 66 candidate edges, but the payload
    // may carry at most knn_k * max_nodes = 5 * 12 = 60
    let corpus = Arc::new(InMemoryCorpus::new());
    for i in 0..12 {
        let id = format!("n{i:02}");
        corpus.insert_chunk(chunk(&id, &[i as f32 * 0.1, 1.0]));
        corpus.set_entities(&id, ["shared"]);
    }
    let service = service_over(corpus);

    let payload = service
        .graph_data(&GraphRequest {
            relation_types: only(RelationType::Entity),
            max_nodes: 12,
            ..GraphRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(payload.nodes.len(), 12);
    assert!(!payload.truncated, "node truncation did not apply");
    assert_eq!(payload.edges.len(), 60, "edge cap applied");
}

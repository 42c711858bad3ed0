//! chunkgraph-server: demo HTTP server over an in-memory corpus.
//!
//! Serves the `/graph-data` contract on `CHUNKGRAPH_ADDR` (default
//! `127.0.0.1:7878`) with a small synthetic corpus, so a visualization
//! front end can be pointed at a running instance without wiring real
//! collaborators.

use anyhow::{Context, Result};
use chunkgraph::{
    http, ChunkRecord, FixedFlags, GraphDataService, InMemoryCorpus, ServiceConfig,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let addr = std::env::var("CHUNKGRAPH_ADDR").unwrap_or_else(|_| "127.0.0.1:7878".to_string());

    let corpus = Arc::new(demo_corpus());
    let service = Arc::new(GraphDataService::new(
        corpus.clone(),
        corpus.clone(),
        corpus,
        Arc::new(FixedFlags::new(true)),
        ServiceConfig::default(),
    ));

    let app = http::router(service);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    println!("chunkgraph-server listening on http://{addr}/graph-data");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// A small corpus with two topical clusters, entities, and anchors.
fn demo_corpus() -> InMemoryCorpus {
    let corpus = InMemoryCorpus::new();

    let chunk = |id: &str, doc: &str, category: &str, embedding: Vec<f32>| ChunkRecord {
        id: id.to_string(),
        label: format!("{doc}:{id}"),
        category: category.to_string(),
        document_id: doc.to_string(),
        embedding,
    };

    // Cluster 1: parser documentation
    corpus.insert_chunk(chunk("chunk_001", "parser.md", "prose", vec![1.0, 0.1, 0.0, 0.0]));
    corpus.insert_chunk(chunk("chunk_002", "parser.md", "code", vec![0.9, 0.2, 0.1, 0.0]));
    corpus.insert_chunk(chunk("chunk_003", "parser.md", "prose", vec![0.8, 0.1, 0.0, 0.1]));

    // Cluster 2: storage notes
    corpus.insert_chunk(chunk("chunk_004", "storage.md", "prose", vec![0.0, 0.1, 1.0, 0.9]));
    corpus.insert_chunk(chunk("chunk_005", "storage.md", "code", vec![0.1, 0.0, 0.9, 1.0]));
    corpus.insert_chunk(chunk("chunk_006", "storage.md", "prose", vec![0.0, 0.2, 0.8, 0.9]));

    corpus.set_entities("chunk_001", ["parser", "grammar"]);
    corpus.set_entities("chunk_002", ["parser", "tokenizer"]);
    corpus.set_entities("chunk_004", ["btree", "page-cache"]);
    corpus.set_entities("chunk_005", ["btree", "wal"]);

    corpus.set_anchor("chunk_001", "tldr");
    corpus.set_anchor("chunk_003", "tldr");
    corpus.set_anchor("chunk_004", "tldr");

    corpus
}

//! Chunkgraph: a chunk-relationship graph data service
//!
//! Chunkgraph turns a corpus of document-chunk embeddings and metadata into
//! a bounded, versioned graph (nodes + typed edges) for visualizing
//! semantic clusters, nearest-neighbor relationships, entity co-occurrence,
//! and structural anchor links.
//!
//! # Guarantees
//!
//! - **Deterministic**: identical parameters against an unchanged corpus
//!   snapshot produce identical nodes and edges (tie-breaking and
//!   truncation are fully specified).
//! - **Single-flight**: concurrent identical requests against a cold cache
//!   run exactly one projection computation; every waiter observes that one
//!   result or that one failure.
//! - **Bounded**: node count is capped by `max_nodes`, edge count by
//!   `knn_k * max_nodes`, and every wait by a configured timeout.
//! - **Sanitized**: raw embedding vectors never appear in a payload; the
//!   wire types cannot carry them.
//!
//! # Feature Flags
//!
//! - **`web-api`**: axum HTTP transport exposing the `/graph-data`
//!   contract, plus the `chunkgraph-server` demo binary.

pub mod cache;
pub mod error;
pub mod error_codes;
pub mod memory;
pub mod projection;
pub mod relations;
pub mod schema;
pub mod service;
pub mod snapshot;
pub mod sources;
pub mod validation;

#[cfg(feature = "web-api")]
pub mod http;

pub use cache::{CacheKey, CacheStats, CacheStore};
pub use error::{GraphServiceError, Result};
pub use memory::{FixedFlags, InMemoryCorpus};
pub use projection::{node_set_hash, EmbeddingProjector, ProjectionResult};
pub use relations::{cap_edges, RelationConfig, RelationshipGraphBuilder};
pub use schema::{
    ChunkNode, Edge, GraphPayload, GraphRequest, RelationType, GRAPH_SCHEMA_VERSION,
    MAX_NODES_HARD_CAP,
};
pub use service::{GraphDataService, ServiceConfig, GRAPH_DATA_FLAG};
pub use snapshot::{CorpusSnapshotTracker, SnapshotToken};
pub use sources::{
    AnchorProvider, ChunkFilter, ChunkRecord, ChunkSource, EntityProvider, FeatureFlags,
};
pub use validation::validate_request;

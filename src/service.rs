//! Graph data service orchestrator.
//!
//! Serves the `/graph-data` contract: validate → resolve snapshot → fetch
//! chunks → build edges → truncate → project (cached, coalesced) →
//! assemble. Any step failing with a typed error short-circuits the
//! request; a failed request returns no payload.
//!
//! # Ordering of truncation and projection
//!
//! Edges are built in source-embedding space over the full eligible node
//! set, so degree-based truncation can rank against the complete,
//! untruncated edge set. Projection — the expensive cached step — then runs
//! only over the surviving nodes, which keeps its input within `max_nodes`
//! and makes the cache key the hash of exactly the projected id set.
//!
//! # Concurrency
//!
//! Arbitrarily many requests may run concurrently. The only shared mutable
//! state is the projection [`CacheStore`], which coalesces identical
//! expensive computations into a single flight per key. A caller
//! disconnecting does not cancel a running projection; its result is still
//! stored for future reuse.

use crate::cache::{CacheKey, CacheStats, CacheStore};
use crate::error::{GraphServiceError, Result};
use crate::projection::{node_set_hash, EmbeddingProjector, ProjectionResult};
use crate::relations::{cap_edges, RelationConfig, RelationshipGraphBuilder};
use crate::schema::{
    ChunkNode, Edge, GraphPayload, GraphRequest, RelationType, GRAPH_SCHEMA_VERSION,
};
use crate::snapshot::{CorpusSnapshotTracker, SnapshotToken};
use crate::sources::{
    AnchorProvider, ChunkFilter, ChunkRecord, ChunkSource, EntityProvider, FeatureFlags,
};
use crate::validation::validate_request;
use ahash::AHashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Feature flag gating the whole service
pub const GRAPH_DATA_FLAG: &str = "graph_data_service";

/// Service tunables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Edge-construction tunables (knn k, entity threshold)
    pub relation: RelationConfig,
    /// Hard ceiling on one projection computation
    pub projection_timeout: Duration,
    /// Seed for deterministic projection
    pub projection_seed: u64,
    /// Completed projection results retained across snapshots/requests
    pub cache_capacity: usize,
    /// Feature flag checked before any work
    pub feature_flag: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            relation: RelationConfig::default(),
            projection_timeout: Duration::from_secs(15),
            projection_seed: 0x6368756e_6b677261, // stable default seed
            cache_capacity: 64,
            feature_flag: GRAPH_DATA_FLAG.to_string(),
        }
    }
}

/// The public orchestrator for the chunk-relationship graph contract.
pub struct GraphDataService {
    chunks: Arc<dyn ChunkSource>,
    entities: Arc<dyn EntityProvider>,
    anchors: Arc<dyn AnchorProvider>,
    flags: Arc<dyn FeatureFlags>,
    config: ServiceConfig,
    tracker: CorpusSnapshotTracker,
    projector: Arc<EmbeddingProjector>,
    builder: RelationshipGraphBuilder,
    cache: CacheStore<ProjectionResult>,
    /// Last token observed; a change triggers wholesale cache invalidation
    last_token: Mutex<Option<SnapshotToken>>,
    /// Projection computations actually executed (not joined or cached)
    projection_runs: Arc<AtomicU64>,
}

impl GraphDataService {
    /// Assemble a service over its four collaborators.
    pub fn new(
        chunks: Arc<dyn ChunkSource>,
        entities: Arc<dyn EntityProvider>,
        anchors: Arc<dyn AnchorProvider>,
        flags: Arc<dyn FeatureFlags>,
        config: ServiceConfig,
    ) -> Self {
        let tracker = CorpusSnapshotTracker::new(Arc::clone(&chunks));
        let projector = Arc::new(EmbeddingProjector::new(config.projection_seed));
        let builder = RelationshipGraphBuilder::new(config.relation.clone());
        let cache = CacheStore::new(config.cache_capacity);
        Self {
            chunks,
            entities,
            anchors,
            flags,
            config,
            tracker,
            projector,
            builder,
            cache,
            last_token: Mutex::new(None),
            projection_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Serve one graph data request.
    pub async fn graph_data(&self, req: &GraphRequest) -> Result<GraphPayload> {
        let started = Instant::now();

        if !self.flags.is_enabled(&self.config.feature_flag) {
            return Err(GraphServiceError::FeatureDisabled(
                self.config.feature_flag.clone(),
            ));
        }

        validate_request(req)?;

        let token = self.tracker.get_snapshot_token()?;
        self.observe_token(token);

        let filter = ChunkFilter {
            document_ids: req.document_filter.clone(),
        };
        let mut chunks = self.chunks.get_chunks(&filter)?;
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        chunks.dedup_by(|a, b| a.id == b.id);

        // Anchor metadata is needed both for anchor edges and node labels
        let mut anchors_by_id: AHashMap<String, Option<String>> =
            AHashMap::with_capacity(chunks.len());
        for chunk in &chunks {
            anchors_by_id.insert(chunk.id.clone(), self.anchors.anchor_for(&chunk.id)?);
        }

        if let Some(wanted) = &req.anchor_filter {
            chunks.retain(|c| {
                anchors_by_id
                    .get(&c.id)
                    .and_then(|a| a.as_deref())
                    .is_some_and(|a| a == wanted)
            });
        }

        if chunks.is_empty() {
            return Ok(GraphPayload::empty(elapsed_ms(started)));
        }

        // Entity edges degrade gracefully: the extractor is non-essential
        let mut degraded: Vec<String> = Vec::new();
        let entity_sets = if req.relation_types.contains(&RelationType::Entity) {
            match self.collect_entities(&chunks) {
                Ok(sets) => Some(sets),
                Err(err) => {
                    eprintln!(
                        "chunkgraph: entity provider unavailable, serving without entity edges: {err}"
                    );
                    degraded.push(RelationType::Entity.as_str().to_string());
                    None
                }
            }
        } else {
            None
        };

        // Full edge set over the eligible nodes; degree truncation ranks
        // against this set before any edge is dropped
        let full_edges = self.builder.build_edges(
            &chunks,
            &anchors_by_id,
            entity_sets.as_ref(),
            &req.relation_types,
        );

        let (kept, truncated) = truncate_by_degree(chunks, &full_edges, req.max_nodes);

        let kept_ids: BTreeSet<&str> = kept.iter().map(|c| c.id.as_str()).collect();
        let surviving: Vec<Edge> = full_edges
            .into_iter()
            .filter(|e| kept_ids.contains(e.source.as_str()) && kept_ids.contains(e.target.as_str()))
            .collect();
        let max_edges = self.config.relation.knn_k.max(1) * req.max_nodes;
        let edges = cap_edges(surviving, max_edges);

        let projection = self.resolve_projection(token, &kept).await?;

        let mut nodes = Vec::with_capacity(kept.len());
        for chunk in &kept {
            let coords = projection.coords_by_id.get(&chunk.id).copied().ok_or_else(|| {
                GraphServiceError::Internal(format!(
                    "projection result missing coords for chunk {}",
                    chunk.id
                ))
            })?;
            nodes.push(ChunkNode {
                id: chunk.id.clone(),
                label: chunk.label.clone(),
                anchor: anchors_by_id.get(&chunk.id).cloned().flatten(),
                coords,
                category: chunk.category.clone(),
            });
        }

        Ok(GraphPayload {
            nodes,
            edges,
            elapsed_ms: elapsed_ms(started),
            v: GRAPH_SCHEMA_VERSION,
            truncated,
            degraded: if degraded.is_empty() {
                None
            } else {
                Some(degraded)
            },
        })
    }

    /// Number of projection computations actually executed.
    ///
    /// Coalesced joiners and cache hits do not increment this; it is the
    /// observable for the single-flight property.
    pub fn projections_computed(&self) -> u64 {
        self.projection_runs.load(Ordering::SeqCst)
    }

    /// Projection cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Look up or compute (single-flight) the projection for this node set.
    async fn resolve_projection(
        &self,
        token: SnapshotToken,
        kept: &[ChunkRecord],
    ) -> Result<Arc<ProjectionResult>> {
        let ids: Vec<String> = kept.iter().map(|c| c.id.clone()).collect();
        let key = CacheKey {
            token,
            node_set_hash: node_set_hash(&ids),
        };

        let items: Vec<(String, Vec<f32>)> = kept
            .iter()
            .map(|c| (c.id.clone(), c.embedding.clone()))
            .collect();
        let projector = Arc::clone(&self.projector);
        let runs = Arc::clone(&self.projection_runs);
        let timeout = self.config.projection_timeout;

        self.cache
            .get_or_compute(key, move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
                let handle = tokio::task::spawn_blocking(move || projector.project(&items));
                match tokio::time::timeout(timeout, handle).await {
                    Err(_elapsed) => Err(GraphServiceError::ComputeTimeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                    Ok(Err(join_err)) => Err(GraphServiceError::Internal(format!(
                        "projection task failed: {join_err}"
                    ))),
                    Ok(Ok(result)) => result,
                }
            })
            .await
    }

    /// Gather entity sets for all eligible chunks; any provider failure
    /// aborts the whole collection (the caller then degrades).
    fn collect_entities(
        &self,
        chunks: &[ChunkRecord],
    ) -> Result<AHashMap<String, BTreeSet<String>>> {
        let mut sets = AHashMap::with_capacity(chunks.len());
        for chunk in chunks {
            sets.insert(chunk.id.clone(), self.entities.entities_for(&chunk.id)?);
        }
        Ok(sets)
    }

    /// Invalidate the projection cache when the corpus token changes.
    ///
    /// Lookups are keyed by the current token, so stale entries can never
    /// be matched anyway; clearing on change bounds memory.
    fn observe_token(&self, token: SnapshotToken) {
        let mut last = self
            .last_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *last != Some(token) {
            if last.is_some() {
                self.cache.invalidate_all();
            }
            *last = Some(token);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Select the `max_nodes` highest-degree nodes.
///
/// Degree is computed over the filtered, pre-truncation edge set; ties
/// break by ascending id. Returns the kept chunks (still in ascending id
/// order) and whether truncation happened.
fn truncate_by_degree(
    chunks: Vec<ChunkRecord>,
    edges: &[Edge],
    max_nodes: usize,
) -> (Vec<ChunkRecord>, bool) {
    if chunks.len() <= max_nodes {
        return (chunks, false);
    }

    let mut degree: AHashMap<&str, usize> = AHashMap::with_capacity(chunks.len());
    for edge in edges {
        *degree.entry(edge.source.as_str()).or_insert(0) += 1;
        *degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    // chunks are id-sorted, so a stable sort by descending degree leaves
    // equal-degree nodes in ascending id order
    let mut ranked: Vec<&ChunkRecord> = chunks.iter().collect();
    ranked.sort_by_key(|c| std::cmp::Reverse(degree.get(c.id.as_str()).copied().unwrap_or(0)));
    let selected: BTreeSet<&str> = ranked[..max_nodes].iter().map(|c| c.id.as_str()).collect();

    let kept = chunks
        .iter()
        .filter(|c| selected.contains(c.id.as_str()))
        .cloned()
        .collect();
    (kept, true)
}

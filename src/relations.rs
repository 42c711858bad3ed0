//! Typed edge construction over a chunk node set.
//!
//! Three relationship algorithms, each deterministic:
//!
//! - `knn`: top-k nearest neighbors by cosine similarity in the *source*
//!   embedding space (not the 2D projection, which would compound
//!   approximation error). Ties break by ascending node id; undirected
//!   duplicates collapse to one edge keeping the higher weight.
//! - `entity`: an edge when two chunks share at least one extracted entity
//!   and their entity-set overlap clears a configurable threshold.
//! - `anchor`: an edge between chunks under the same named structural
//!   anchor within the same document; exact-match relation, weight 1.0.
//!
//! Only relation types present in the request are computed; the builder
//! never emits an edge of a type that was not asked for.

use crate::schema::{Edge, RelationType};
use crate::sources::ChunkRecord;
use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

/// Tunables for edge construction.
#[derive(Debug, Clone)]
pub struct RelationConfig {
    /// Neighbors per node for `knn` edges
    pub knn_k: usize,
    /// Minimum entity-set Jaccard overlap for an `entity` edge
    pub entity_threshold: f64,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            knn_k: 5,
            entity_threshold: 0.1,
        }
    }
}

/// Builds typed edges over a node set.
pub struct RelationshipGraphBuilder {
    config: RelationConfig,
}

impl RelationshipGraphBuilder {
    /// Create a builder with the given tunables.
    pub fn new(config: RelationConfig) -> Self {
        Self { config }
    }

    /// Construct the full edge set for the requested relation types.
    ///
    /// `chunks` must be sorted by ascending id with unique ids; the service
    /// guarantees this. `entities` is `None` when the entity collaborator
    /// is unavailable or `entity` edges were not requested. The returned
    /// set is deduplicated but not yet capped; capping happens after node
    /// truncation via [`cap_edges`].
    pub fn build_edges(
        &self,
        chunks: &[ChunkRecord],
        anchors: &AHashMap<String, Option<String>>,
        entities: Option<&AHashMap<String, BTreeSet<String>>>,
        relation_types: &BTreeSet<RelationType>,
    ) -> Vec<Edge> {
        // Keyed by (source, target, type); source < target, so undirected
        // duplicates land on the same slot and keep the higher weight.
        let mut edges: BTreeMap<(String, String, RelationType), f64> = BTreeMap::new();

        if relation_types.contains(&RelationType::Knn) {
            self.knn_edges(chunks, &mut edges);
        }
        if relation_types.contains(&RelationType::Entity) {
            if let Some(entities) = entities {
                self.entity_edges(chunks, entities, &mut edges);
            }
        }
        if relation_types.contains(&RelationType::Anchor) {
            self.anchor_edges(chunks, anchors, &mut edges);
        }

        edges
            .into_iter()
            .map(|((source, target, kind), weight)| Edge {
                source,
                target,
                kind,
                weight,
            })
            .collect()
    }

    /// Top-k nearest neighbors per node by source-space cosine similarity.
    fn knn_edges(
        &self,
        chunks: &[ChunkRecord],
        edges: &mut BTreeMap<(String, String, RelationType), f64>,
    ) {
        let k = self.config.knn_k;
        if k == 0 || chunks.len() < 2 {
            return;
        }

        let norms: Vec<f64> = chunks
            .par_iter()
            .map(|c| {
                c.embedding
                    .iter()
                    .map(|&x| (x as f64) * (x as f64))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect();

        let per_node: Vec<Vec<(usize, f64)>> = (0..chunks.len())
            .into_par_iter()
            .map(|i| {
                let mut candidates: Vec<(usize, f64)> = (0..chunks.len())
                    .filter(|&j| j != i)
                    .map(|j| (j, cosine(&chunks[i], &chunks[j], norms[i], norms[j])))
                    .collect();
                // Strongest first; equal similarity breaks by ascending id
                // (chunks are id-sorted, so ascending index is ascending id)
                candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                candidates.truncate(k);
                candidates
            })
            .collect();

        for (i, neighbors) in per_node.iter().enumerate() {
            for &(j, similarity) in neighbors {
                let weight = ((similarity + 1.0) / 2.0).clamp(0.0, 1.0);
                insert_undirected(
                    edges,
                    &chunks[i].id,
                    &chunks[j].id,
                    RelationType::Knn,
                    weight,
                );
            }
        }
    }

    /// Entity co-occurrence edges: shared entity plus Jaccard overlap
    /// at or above the threshold.
    fn entity_edges(
        &self,
        chunks: &[ChunkRecord],
        entities: &AHashMap<String, BTreeSet<String>>,
        edges: &mut BTreeMap<(String, String, RelationType), f64>,
    ) {
        let empty = BTreeSet::new();
        for (i, a) in chunks.iter().enumerate() {
            let set_a = entities.get(&a.id).unwrap_or(&empty);
            if set_a.is_empty() {
                continue;
            }
            for b in &chunks[i + 1..] {
                let set_b = entities.get(&b.id).unwrap_or(&empty);
                if set_b.is_empty() {
                    continue;
                }
                let shared = set_a.intersection(set_b).count();
                if shared == 0 {
                    continue;
                }
                let union = set_a.len() + set_b.len() - shared;
                let weight = (shared as f64 / union as f64).clamp(0.0, 1.0);
                if weight >= self.config.entity_threshold {
                    insert_undirected(edges, &a.id, &b.id, RelationType::Entity, weight);
                }
            }
        }
    }

    /// Anchor edges: all pairs sharing a (document, anchor) group.
    fn anchor_edges(
        &self,
        chunks: &[ChunkRecord],
        anchors: &AHashMap<String, Option<String>>,
        edges: &mut BTreeMap<(String, String, RelationType), f64>,
    ) {
        let mut groups: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
        for chunk in chunks {
            if let Some(Some(anchor)) = anchors.get(&chunk.id) {
                groups
                    .entry((chunk.document_id.as_str(), anchor.as_str()))
                    .or_default()
                    .push(chunk.id.as_str());
            }
        }

        for members in groups.values() {
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    insert_undirected(edges, a, b, RelationType::Anchor, 1.0);
                }
            }
        }
    }
}

/// Bound the edge set and emit it in deterministic output order.
///
/// Keeps the `max_edges` strongest edges (excess dropped by ascending
/// weight, ties broken by the (source, target, type) key), then sorts the
/// survivors by (source, target, type) for a stable payload.
pub fn cap_edges(mut edges: Vec<Edge>, max_edges: usize) -> Vec<Edge> {
    if edges.len() > max_edges {
        edges.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.target.cmp(&b.target))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        edges.truncate(max_edges);
    }
    edges.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.target.cmp(&b.target))
            .then_with(|| a.kind.cmp(&b.kind))
    });
    edges
}

fn insert_undirected(
    edges: &mut BTreeMap<(String, String, RelationType), f64>,
    a: &str,
    b: &str,
    kind: RelationType,
    weight: f64,
) {
    if a == b {
        return;
    }
    let (source, target) = if a < b { (a, b) } else { (b, a) };
    let slot = edges
        .entry((source.to_string(), target.to_string(), kind))
        .or_insert(f64::MIN);
    if weight > *slot {
        *slot = weight;
    }
}

/// Cosine similarity in source space.
///
/// Non-finite inputs carry no usable direction: a NaN or infinite
/// embedding component makes the norm non-finite, and the pair scores 0.0
/// like a zero-norm vector, keeping every downstream weight in [0, 1].
fn cosine(a: &ChunkRecord, b: &ChunkRecord, norm_a: f64, norm_b: f64) -> f64 {
    if !norm_a.is_finite() || !norm_b.is_finite() || norm_a <= f64::EPSILON || norm_b <= f64::EPSILON
    {
        return 0.0;
    }
    let dot: f64 = a
        .embedding
        .iter()
        .zip(b.embedding.iter())
        .map(|(&x, &y)| (x as f64) * (y as f64))
        .sum();
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity
    } else {
        0.0
    }
}

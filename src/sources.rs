//! Read-only collaborator interfaces.
//!
//! The graph data service consumes four external collaborators: the chunk
//! store, the entity-extraction subsystem, anchor metadata, and the feature
//! flag predicate. All are read-only from this crate's perspective; no
//! writes are ever issued through these traits.
//!
//! Availability contract: the chunk store is essential (failure fails the
//! request); the entity subsystem is non-essential (failure degrades the
//! response, dropping `entity` edges).

use crate::error::Result;
use std::collections::BTreeSet;

/// A chunk record as returned by the chunk store.
///
/// The embedding never crosses the service boundary; it is consumed by the
/// projector and the relationship builder and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Unique chunk id
    pub id: String,
    /// Source-space embedding vector
    pub embedding: Vec<f32>,
    /// Human-readable label, e.g. "file.md:45-67"
    pub label: String,
    /// Category tag, e.g. "code" or "prose"
    pub category: String,
    /// Owning document id
    pub document_id: String,
}

/// Filter applied by the chunk store when listing chunks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFilter {
    /// Restrict to chunks of these documents; `None` means all documents
    pub document_ids: Option<Vec<String>>,
}

/// The chunk store collaborator (essential).
pub trait ChunkSource: Send + Sync {
    /// List chunk records matching the filter.
    fn get_chunks(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>>;

    /// Cheap, monotonically non-decreasing corpus revision.
    ///
    /// Equal across calls when and only when no chunk data has changed
    /// (e.g. an indexed max-timestamp). Must be O(1)-ish and side-effect
    /// free.
    fn corpus_revision(&self) -> Result<u64>;
}

/// The entity-extraction collaborator (non-essential).
pub trait EntityProvider: Send + Sync {
    /// Extracted entities for one chunk.
    fn entities_for(&self, chunk_id: &str) -> Result<BTreeSet<String>>;
}

/// Anchor metadata collaborator.
pub trait AnchorProvider: Send + Sync {
    /// Named structural anchor for one chunk, if any.
    fn anchor_for(&self, chunk_id: &str) -> Result<Option<String>>;
}

/// Feature flag predicate supplied by the host application.
pub trait FeatureFlags: Send + Sync {
    /// Whether the named feature is enabled.
    fn is_enabled(&self, flag: &str) -> bool;
}

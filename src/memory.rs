//! In-memory collaborator implementations.
//!
//! Backs the demo server and the integration test suite. Besides plain
//! storage, the corpus exposes failure injection (chunk store offline,
//! entity provider offline) and call counters so tests can assert how
//! often the expensive paths actually ran.

use crate::error::{GraphServiceError, Result};
use crate::sources::{
    AnchorProvider, ChunkFilter, ChunkRecord, ChunkSource, EntityProvider, FeatureFlags,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

#[derive(Default)]
struct CorpusState {
    chunks: Vec<ChunkRecord>,
    entities: HashMap<String, BTreeSet<String>>,
    anchors: HashMap<String, String>,
}

/// An in-memory corpus implementing all read-only collaborators.
#[derive(Default)]
pub struct InMemoryCorpus {
    state: RwLock<CorpusState>,
    revision: AtomicU64,
    chunks_available: AtomicBool,
    entities_available: AtomicBool,
    get_chunks_calls: AtomicU64,
}

impl InMemoryCorpus {
    /// Create an empty corpus at revision 0, all collaborators available.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CorpusState::default()),
            revision: AtomicU64::new(0),
            chunks_available: AtomicBool::new(true),
            entities_available: AtomicBool::new(true),
            get_chunks_calls: AtomicU64::new(0),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, CorpusState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, CorpusState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a chunk and bump the corpus revision.
    pub fn insert_chunk(&self, chunk: ChunkRecord) {
        self.write().chunks.push(chunk);
        self.bump_revision();
    }

    /// Attach extracted entities to a chunk.
    pub fn set_entities<I, S>(&self, chunk_id: &str, entities: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.write().entities.insert(
            chunk_id.to_string(),
            entities.into_iter().map(Into::into).collect(),
        );
    }

    /// Attach a structural anchor to a chunk.
    pub fn set_anchor(&self, chunk_id: &str, anchor: &str) {
        self.write()
            .anchors
            .insert(chunk_id.to_string(), anchor.to_string());
    }

    /// Advance the corpus revision without changing data (simulates an
    /// unrelated corpus write).
    pub fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    /// Toggle chunk store availability (failure injection).
    pub fn set_chunks_available(&self, available: bool) {
        self.chunks_available.store(available, Ordering::SeqCst);
    }

    /// Toggle entity provider availability (failure injection).
    pub fn set_entities_available(&self, available: bool) {
        self.entities_available.store(available, Ordering::SeqCst);
    }

    /// How many times `get_chunks` was called.
    pub fn get_chunks_calls(&self) -> u64 {
        self.get_chunks_calls.load(Ordering::SeqCst)
    }
}

impl ChunkSource for InMemoryCorpus {
    fn get_chunks(&self, filter: &ChunkFilter) -> Result<Vec<ChunkRecord>> {
        self.get_chunks_calls.fetch_add(1, Ordering::SeqCst);
        if !self.chunks_available.load(Ordering::SeqCst) {
            return Err(GraphServiceError::DataUnavailable(
                "chunk store offline".into(),
            ));
        }
        let state = self.read();
        let chunks = state
            .chunks
            .iter()
            .filter(|c| match &filter.document_ids {
                Some(ids) => ids.iter().any(|id| id == &c.document_id),
                None => true,
            })
            .cloned()
            .collect();
        Ok(chunks)
    }

    fn corpus_revision(&self) -> Result<u64> {
        if !self.chunks_available.load(Ordering::SeqCst) {
            return Err(GraphServiceError::DataUnavailable(
                "chunk store offline".into(),
            ));
        }
        Ok(self.revision.load(Ordering::SeqCst))
    }
}

impl EntityProvider for InMemoryCorpus {
    fn entities_for(&self, chunk_id: &str) -> Result<BTreeSet<String>> {
        if !self.entities_available.load(Ordering::SeqCst) {
            return Err(GraphServiceError::DataUnavailable(
                "entity subsystem offline".into(),
            ));
        }
        Ok(self.read().entities.get(chunk_id).cloned().unwrap_or_default())
    }
}

impl AnchorProvider for InMemoryCorpus {
    fn anchor_for(&self, chunk_id: &str) -> Result<Option<String>> {
        Ok(self.read().anchors.get(chunk_id).cloned())
    }
}

/// A fixed feature-flag predicate.
pub struct FixedFlags {
    enabled: AtomicBool,
}

impl FixedFlags {
    /// All flags report the given state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Flip the flag state at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl FeatureFlags for FixedFlags {
    fn is_enabled(&self, _flag: &str) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

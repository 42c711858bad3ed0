//! Corpus snapshot tracking.
//!
//! A snapshot token is an opaque representation of "the current state of the
//! corpus". It is compared for equality only and never interpreted; cache
//! entries keyed by a stale token are simply never matched again.

use crate::error::Result;
use crate::sources::ChunkSource;
use std::fmt;
use std::sync::Arc;

/// Opaque, comparable corpus state token.
///
/// Equality means "no chunk data changed between the two observations".
/// The inner value is deliberately private; callers must not interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotToken(u64);

impl SnapshotToken {
    pub(crate) fn from_revision(revision: u64) -> Self {
        SnapshotToken(revision)
    }
}

impl fmt::Display for SnapshotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot:{:016x}", self.0)
    }
}

/// Computes the current corpus snapshot token from the chunk store.
///
/// Side-effect free and O(1)-ish (delegates to the store's indexed revision
/// query). An unreachable store surfaces as `DataUnavailable`; no retry
/// happens here, the caller decides.
pub struct CorpusSnapshotTracker {
    source: Arc<dyn ChunkSource>,
}

impl CorpusSnapshotTracker {
    /// Create a tracker over the given chunk store.
    pub fn new(source: Arc<dyn ChunkSource>) -> Self {
        Self { source }
    }

    /// Current snapshot token.
    pub fn get_snapshot_token(&self) -> Result<SnapshotToken> {
        self.source
            .corpus_revision()
            .map(SnapshotToken::from_revision)
    }
}

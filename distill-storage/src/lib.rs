//! DISTILL Storage - Transcript Store Trait and Mock Implementation
//!
//! Defines where per-request records end up. The file-backed store in
//! [`file`] is what the service uses; [`MockTranscriptStore`] keeps
//! everything in memory for tests.

pub mod file;

pub use file::FileTranscriptStore;

use async_trait::async_trait;
use distill_core::{DistillResult, RawRecord, RefinedTranscript, StorageError, TraceId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

// ============================================================================
// RECORD KINDS
// ============================================================================

/// The two artifacts written per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Raw,
    Refined,
}

impl RecordKind {
    /// Directory name under the store root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            RecordKind::Raw => "raw",
            RecordKind::Refined => "refined",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Where a saved record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredAt {
    Path(PathBuf),
    Memory,
}

impl fmt::Display for StoredAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoredAt::Path(path) => write!(f, "{}", path.display()),
            StoredAt::Memory => f.write_str("memory"),
        }
    }
}

/// Persistence for raw records and refined transcripts, keyed by trace id.
/// Saving the same trace id twice overwrites.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn save_raw(&self, record: &RawRecord) -> DistillResult<StoredAt>;

    async fn save_refined(&self, transcript: &RefinedTranscript) -> DistillResult<StoredAt>;

    /// # Returns
    /// * `Err(StorageError::NotFound)` - Nothing stored for this trace
    async fn load_raw(&self, trace_id: &TraceId) -> DistillResult<RawRecord>;

    async fn load_refined(&self, trace_id: &TraceId) -> DistillResult<RefinedTranscript>;
}

pub(crate) fn not_found(kind: RecordKind, trace_id: &TraceId) -> StorageError {
    StorageError::NotFound {
        kind: kind.to_string(),
        trace_id: trace_id.to_string(),
    }
}

// ============================================================================
// MOCK STORE
// ============================================================================

/// In-memory transcript store for testing.
#[derive(Debug, Default, Clone)]
pub struct MockTranscriptStore {
    raw: Arc<RwLock<HashMap<TraceId, RawRecord>>>,
    refined: Arc<RwLock<HashMap<TraceId, RefinedTranscript>>>,
}

impl MockTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw_count(&self) -> usize {
        self.raw.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn refined_count(&self) -> usize {
        self.refined.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        if let Ok(mut raw) = self.raw.write() {
            raw.clear();
        }
        if let Ok(mut refined) = self.refined.write() {
            refined.clear();
        }
    }
}

#[async_trait]
impl TranscriptStore for MockTranscriptStore {
    async fn save_raw(&self, record: &RawRecord) -> DistillResult<StoredAt> {
        let mut raw = self.raw.write().map_err(|_| StorageError::LockPoisoned)?;
        raw.insert(record.trace_id.clone(), record.clone());
        Ok(StoredAt::Memory)
    }

    async fn save_refined(&self, transcript: &RefinedTranscript) -> DistillResult<StoredAt> {
        let mut refined = self.refined.write().map_err(|_| StorageError::LockPoisoned)?;
        refined.insert(transcript.trace_id.clone(), transcript.clone());
        Ok(StoredAt::Memory)
    }

    async fn load_raw(&self, trace_id: &TraceId) -> DistillResult<RawRecord> {
        let raw = self.raw.read().map_err(|_| StorageError::LockPoisoned)?;
        raw.get(trace_id)
            .cloned()
            .ok_or_else(|| not_found(RecordKind::Raw, trace_id).into())
    }

    async fn load_refined(&self, trace_id: &TraceId) -> DistillResult<RefinedTranscript> {
        let refined = self.refined.read().map_err(|_| StorageError::LockPoisoned)?;
        refined
            .get(trace_id)
            .cloned()
            .ok_or_else(|| not_found(RecordKind::Refined, trace_id).into())
    }
}

// ============================================================================
// TESTS
// ============================================================================

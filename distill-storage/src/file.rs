//! File-backed transcript store
//!
//! Layout under the root directory:
//!
//! ```text
//! {root}/raw/trace_{trace_id}.json
//! {root}/refined/trace_{trace_id}.json
//! ```
//!
//! Files are pretty-printed with a four-space indent and keep non-ASCII
//! text as-is. Each write goes to a hidden temporary sibling with a unique
//! name first and is renamed into place, so readers never observe a
//! half-written record and concurrent writers of one id never share a
//! temporary file.

use crate::{not_found, RecordKind, StoredAt, TranscriptStore};
use async_trait::async_trait;
use distill_core::{DistillResult, RawRecord, RefinedTranscript, StorageError, TraceId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Transcript store writing JSON files below a root directory.
#[derive(Debug, Clone)]
pub struct FileTranscriptStore {
    root: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record of `kind` for `trace_id`.
    ///
    /// Trace ids are used as file name components, so anything outside
    /// `[A-Za-z0-9_-]` is rejected.
    pub fn path_for(&self, kind: RecordKind, trace_id: &TraceId) -> DistillResult<PathBuf> {
        let id = trace_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::Io {
                path: self.root.join(kind.dir_name()).display().to_string(),
                reason: format!("trace id {:?} is not a valid file name", id),
            }
            .into());
        }
        Ok(self
            .root
            .join(kind.dir_name())
            .join(format!("trace_{}.json", id)))
    }

    async fn write<T: Serialize + Sync>(
        &self,
        kind: RecordKind,
        trace_id: &TraceId,
        value: &T,
    ) -> DistillResult<StoredAt> {
        let path = self.path_for(kind, trace_id)?;
        let bytes = to_pretty_json(value).map_err(|e| StorageError::Serialization {
            what: format!("{} record {}", kind, trace_id),
            reason: e.to_string(),
        })?;

        let dir = self.root.join(kind.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        let tmp = dir.join(format!(
            ".trace_{}.json.{}.tmp",
            trace_id.as_str(),
            Uuid::now_v7().simple()
        ));
        if let Err(e) = tokio::fs::write(&tmp, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&tmp, e).into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&path, e).into());
        }

        tracing::debug!(
            trace_id = %trace_id,
            kind = %kind,
            bytes = bytes.len(),
            path = %path.display(),
            "Record written"
        );
        Ok(StoredAt::Path(path))
    }

    async fn read<T: DeserializeOwned>(
        &self,
        kind: RecordKind,
        trace_id: &TraceId,
    ) -> DistillResult<T> {
        let path = self.path_for(kind, trace_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(not_found(kind, trace_id).into())
            }
            Err(e) => return Err(io_error(&path, e).into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization {
                what: path.display().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(out)
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn save_raw(&self, record: &RawRecord) -> DistillResult<StoredAt> {
        self.write(RecordKind::Raw, &record.trace_id, record).await
    }

    async fn save_refined(&self, transcript: &RefinedTranscript) -> DistillResult<StoredAt> {
        self.write(RecordKind::Refined, &transcript.trace_id, transcript)
            .await
    }

    async fn load_raw(&self, trace_id: &TraceId) -> DistillResult<RawRecord> {
        self.read(RecordKind::Raw, trace_id).await
    }

    async fn load_refined(&self, trace_id: &TraceId) -> DistillResult<RefinedTranscript> {
        self.read(RecordKind::Refined, trace_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use distill_core::{DistillError, Message};
    use serde_json::json;

    fn record(id: &str) -> RawRecord {
        RawRecord {
            trace_id: TraceId::from_string(id),
            timestamp: Utc::now(),
            instruction: "BRCA1 변이를 설명해줘".to_string(),
            langfuse_full_trace: Some(json!({"id": id, "observations": []})),
            response_log: vec![json!({"type": "ai", "content": "x"})],
            final_answer: "done".to_string(),
        }
    }

    #[tokio::test]
    async fn test_raw_record_layout_and_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTranscriptStore::new(dir.path());
        let rec = record("abc123");

        let stored = store.save_raw(&rec).await.expect("saved");
        let expected = dir.path().join("raw").join("trace_abc123.json");
        assert_eq!(stored, StoredAt::Path(expected.clone()));

        let text = std::fs::read_to_string(&expected).expect("file exists");
        assert!(text.contains("\n    \"trace_id\": \"abc123\""));
        assert!(text.contains("BRCA1 변이를 설명해줘"));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("raw"))
            .expect("raw dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name())
            .filter(|name| name != "trace_abc123.json")
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {:?}", leftovers);

        let loaded = store.load_raw(&rec.trace_id).await.expect("loads");
        assert_eq!(loaded, rec);
    }

    #[tokio::test]
    async fn test_refined_overwrites() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTranscriptStore::new(dir.path());
        let id = TraceId::from_string("t1");

        for answer in ["first", "second"] {
            let transcript = RefinedTranscript {
                trace_id: id.clone(),
                final_answer: answer.to_string(),
                messages: vec![Message::system("s"), Message::human("q"), Message::ai(answer)],
            };
            store.save_refined(&transcript).await.expect("saved");
        }

        let loaded = store.load_refined(&id).await.expect("loads");
        assert_eq!(loaded.final_answer, "second");
        assert_eq!(loaded.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_writes_of_one_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTranscriptStore::new(dir.path());
        let mut first = record("shared");
        first.final_answer = "first".to_string();
        let mut second = record("shared");
        second.final_answer = "second".to_string();

        let (a, b) = tokio::join!(store.save_raw(&first), store.save_raw(&second));
        assert!(a.is_ok(), "first write failed: {:?}", a);
        assert!(b.is_ok(), "second write failed: {:?}", b);

        let names: Vec<_> = std::fs::read_dir(dir.path().join("raw"))
            .expect("raw dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["trace_shared.json".to_string()]);

        let loaded = store.load_raw(&first.trace_id).await.expect("loads");
        assert!(loaded == first || loaded == second);
    }

    #[tokio::test]
    async fn test_missing_and_invalid_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileTranscriptStore::new(dir.path());

        let missing = store.load_raw(&TraceId::from_string("absent")).await;
        assert!(matches!(
            missing,
            Err(DistillError::Storage(StorageError::NotFound { .. }))
        ));

        let escape = store.save_raw(&record("../etc")).await;
        assert!(matches!(
            escape,
            Err(DistillError::Storage(StorageError::Io { .. }))
        ));
    }
}

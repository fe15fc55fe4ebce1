use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{MemoError, Result};

/// One recorded annotation attached to a photo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMemoRecord {
    /// Locator of the audio file
    pub file_path: String,
    /// Clip length in seconds (0 when not measured)
    pub duration: f64,
    /// Creation time in milliseconds since epoch
    pub timestamp: i64,
}

impl VoiceMemoRecord {
    /// Filesystem path of the audio file
    ///
    /// Documents written by the mobile app store `file://` URIs; those resolve to plain paths.
    pub fn path(&self) -> PathBuf {
        let raw = self
            .file_path
            .strip_prefix("file://")
            .unwrap_or(&self.file_path);
        PathBuf::from(raw)
    }
}

/// Photo id -> ordered memo list. Serializes as a plain JSON object keyed by photo id.
///
/// No photo id maps to an empty list: removals prune emptied entries and
/// `from_document` drops empty lists found in stored documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoMemoMapping(BTreeMap<String, Vec<VoiceMemoRecord>>);

impl PhotoMemoMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored document
    pub fn from_document(document: &str) -> serde_json::Result<Self> {
        let mut mapping: PhotoMemoMapping = serde_json::from_str(document)?;
        mapping.0.retain(|_, memos| !memos.is_empty());
        Ok(mapping)
    }

    /// Serialize the whole mapping
    pub fn to_document(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.0)
    }

    /// Memos for a photo in recording order (empty if none)
    pub fn memos(&self, photo_id: &str) -> &[VoiceMemoRecord] {
        self.0.get(photo_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, photo_id: &str, index: usize) -> Result<&VoiceMemoRecord> {
        let memos = self.memos(photo_id);
        memos.get(index).ok_or_else(|| MemoError::IndexOutOfRange {
            photo_id: photo_id.to_string(),
            index,
            len: memos.len(),
        })
    }

    pub fn append(&mut self, photo_id: &str, record: VoiceMemoRecord) {
        self.0.entry(photo_id.to_string()).or_default().push(record);
    }

    /// Remove the memo at `index`, dropping the photo id once its list is empty
    pub fn remove(&mut self, photo_id: &str, index: usize) -> Result<VoiceMemoRecord> {
        let len = self.memos(photo_id).len();
        if index >= len {
            return Err(MemoError::IndexOutOfRange {
                photo_id: photo_id.to_string(),
                index,
                len,
            });
        }

        let mut emptied = false;
        let mut removed = None;
        if let Some(memos) = self.0.get_mut(photo_id) {
            removed = Some(memos.remove(index));
            emptied = memos.is_empty();
        }
        if emptied {
            self.0.remove(photo_id);
        }

        removed.ok_or_else(|| MemoError::IndexOutOfRange {
            photo_id: photo_id.to_string(),
            index,
            len,
        })
    }

    pub fn contains_photo(&self, photo_id: &str) -> bool {
        self.0.contains_key(photo_id)
    }

    pub fn photo_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of photos with at least one memo
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_memos(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Millisecond wall clock that never goes backwards within the process
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_ms: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_millis(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let previous = self.last_ms.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, timestamp: i64) -> VoiceMemoRecord {
        VoiceMemoRecord {
            file_path: path.to_string(),
            duration: 0.0,
            timestamp,
        }
    }

    #[test]
    fn test_document_field_names() {
        let mut mapping = PhotoMemoMapping::new();
        mapping.append("photo-1", record("/memos/memo_1.wav", 1));

        let doc = mapping.to_document().unwrap();
        assert_eq!(
            doc,
            r#"{"photo-1":[{"filePath":"/memos/memo_1.wav","duration":0.0,"timestamp":1}]}"#
        );
    }

    #[test]
    fn test_parse_document_from_mobile_app() {
        let doc = r#"{"A1B2":[{"filePath":"file:///data/memos/memo_1700000000000.m4a","duration":0,"timestamp":1700000000001}],"EMPTY":[]}"#;
        let mapping = PhotoMemoMapping::from_document(doc).unwrap();

        assert_eq!(mapping.len(), 1);
        assert!(!mapping.contains_photo("EMPTY"));
        let memo = &mapping.memos("A1B2")[0];
        assert_eq!(memo.timestamp, 1700000000001);
        assert_eq!(
            memo.path(),
            PathBuf::from("/data/memos/memo_1700000000000.m4a")
        );
    }

    #[test]
    fn test_remove_keeps_order_and_prunes() {
        let mut mapping = PhotoMemoMapping::new();
        mapping.append("p", record("a", 1));
        mapping.append("p", record("b", 2));
        mapping.append("p", record("c", 3));

        let removed = mapping.remove("p", 1).unwrap();
        assert_eq!(removed.file_path, "b");
        let remaining: Vec<_> = mapping.memos("p").iter().map(|m| m.file_path.as_str()).collect();
        assert_eq!(remaining, vec!["a", "c"]);

        mapping.remove("p", 0).unwrap();
        mapping.remove("p", 0).unwrap();
        assert!(!mapping.contains_photo("p"));
        assert!(mapping.is_empty());
        assert_eq!(mapping.to_document().unwrap(), "{}");
    }

    #[test]
    fn test_out_of_range_does_not_clamp() {
        let mut mapping = PhotoMemoMapping::new();
        mapping.append("p", record("a", 1));
        mapping.append("p", record("b", 2));

        match mapping.get("p", 5) {
            Err(MemoError::IndexOutOfRange { index, len, .. }) => {
                assert_eq!(index, 5);
                assert_eq!(len, 2);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
        assert!(mapping.remove("p", 2).is_err());
        assert!(mapping.remove("missing", 0).is_err());
        assert_eq!(mapping.total_memos(), 2);
    }

    #[test]
    fn test_clock_is_monotonic() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now_millis();
        for _ in 0..1000 {
            let now = clock.now_millis();
            assert!(now >= previous);
            previous = now;
        }
    }
}

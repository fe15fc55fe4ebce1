use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::constants::MEMO_FILE_PREFIX;
use crate::error::{MemoError, Result};
use crate::model::MonotonicClock;

/// Owns the memo audio directory
pub struct MemoFileManager {
    directory: PathBuf,
    extension: String,
    clock: Arc<MonotonicClock>,
}

impl MemoFileManager {
    pub fn new(
        directory: impl Into<PathBuf>,
        extension: impl Into<String>,
        clock: Arc<MonotonicClock>,
    ) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
            clock,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the memo directory (and parents) if missing
    pub async fn ensure_directory(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| MemoError::Storage(self.directory.clone(), e))
    }

    /// File name for a memo created at `timestamp_ms`
    pub fn file_name_for(&self, timestamp_ms: i64) -> String {
        format!("{}{}.{}", MEMO_FILE_PREFIX, timestamp_ms, self.extension)
    }

    /// Move a freshly recorded file into the memo directory and return its new locator
    pub async fn commit(&self, temp: &Path) -> Result<PathBuf> {
        let exists = tokio::fs::try_exists(temp)
            .await
            .map_err(|e| MemoError::FileOperation(temp.to_path_buf(), e))?;
        if !exists {
            return Err(MemoError::FileOperation(
                temp.to_path_buf(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "recorded file does not exist"),
            ));
        }

        let target = self.unused_target(self.clock.now_millis()).await;

        if let Err(rename_err) = tokio::fs::rename(temp, &target).await {
            // Rename fails across filesystems; copy then delete instead
            debug!(
                "Rename {} -> {} failed ({}), copying",
                temp.display(),
                target.display(),
                rename_err
            );
            // Source was checked above, so a failure here is about the target
            tokio::fs::copy(temp, &target)
                .await
                .map_err(|e| MemoError::FileOperation(target.clone(), e))?;
            if let Err(e) = tokio::fs::remove_file(temp).await {
                warn!("Failed to remove recorded file {}: {}", temp.display(), e);
            }
        }

        info!("Committed memo {}", target.display());
        Ok(target)
    }

    /// Delete-if-exists
    pub async fn remove(&self, locator: &Path) -> Result<()> {
        match tokio::fs::remove_file(locator).await {
            Ok(()) => {
                debug!("Removed memo file {}", locator.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoError::FileOperation(locator.to_path_buf(), e)),
        }
    }

    async fn unused_target(&self, timestamp_ms: i64) -> PathBuf {
        let target = self.directory.join(self.file_name_for(timestamp_ms));
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return target;
        }

        let mut suffix = 1u32;
        loop {
            let candidate = self.directory.join(format!(
                "{}{}_{}.{}",
                MEMO_FILE_PREFIX, timestamp_ms, suffix, self.extension
            ));
            if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            suffix += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path) -> MemoFileManager {
        MemoFileManager::new(dir.join("memos"), "wav", Arc::new(MonotonicClock::new()))
    }

    #[tokio::test]
    async fn test_ensure_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());

        files.ensure_directory().await.unwrap();
        files.ensure_directory().await.unwrap();
        assert!(dir.path().join("memos").is_dir());
    }

    #[tokio::test]
    async fn test_ensure_directory_fails_on_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("memos"), b"in the way").unwrap();

        let err = manager(dir.path()).ensure_directory().await.unwrap_err();
        assert!(matches!(err, MemoError::Storage(..)));
    }

    #[tokio::test]
    async fn test_commit_moves_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());
        files.ensure_directory().await.unwrap();

        let temp = dir.path().join("recording_abc.wav");
        std::fs::write(&temp, b"RIFF").unwrap();

        let locator = files.commit(&temp).await.unwrap();
        assert!(!temp.exists());
        assert_eq!(locator.parent().unwrap(), dir.path().join("memos"));
        let name = locator.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("memo_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(&locator).unwrap(), b"RIFF");
    }

    #[tokio::test]
    async fn test_commit_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());
        files.ensure_directory().await.unwrap();

        let mut locators = Vec::new();
        for i in 0..5 {
            let temp = dir.path().join(format!("rec_{}.wav", i));
            std::fs::write(&temp, [i as u8]).unwrap();
            locators.push(files.commit(&temp).await.unwrap());
        }

        for (i, locator) in locators.iter().enumerate() {
            assert_eq!(std::fs::read(locator).unwrap(), vec![i as u8]);
        }
    }

    #[tokio::test]
    async fn test_commit_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());
        files.ensure_directory().await.unwrap();

        let err = files.commit(&dir.path().join("gone.wav")).await.unwrap_err();
        match err {
            MemoError::FileOperation(path, e) => {
                assert_eq!(path, dir.path().join("gone.wav"));
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected FileOperation, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_commit_into_missing_directory_names_target() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());

        let temp = dir.path().join("recording_abc.wav");
        std::fs::write(&temp, b"RIFF").unwrap();

        match files.commit(&temp).await.unwrap_err() {
            MemoError::FileOperation(path, e) => {
                assert_eq!(path.parent().unwrap(), dir.path().join("memos"));
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected FileOperation, got {}", other),
        }
        assert!(temp.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let files = manager(dir.path());

        files.remove(&dir.path().join("memos/memo_1.wav")).await.unwrap();

        let existing = dir.path().join("memo_2.wav");
        std::fs::write(&existing, b"x").unwrap();
        files.remove(&existing).await.unwrap();
        files.remove(&existing).await.unwrap();
        assert!(!existing.exists());
    }
}

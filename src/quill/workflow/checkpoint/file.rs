// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Checkpoint, CheckpointStore};
use crate::kit::error::CheckpointError;

/// One pretty-printed JSON file per session: `<dir>/<encoded key>.json`.
///
/// Keys are percent-encoded, so distinct keys never share a file; the
/// stored checkpoint keeps the original key.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// The directory is created lazily on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(session_key)))
    }

    async fn read(path: &Path) -> Result<Option<Checkpoint>, CheckpointError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Percent-encode every byte outside `[A-Za-z0-9_-]`. Injective, and the
/// result is a safe file name on every platform.
fn encode_key(session_key: &str) -> String {
    let mut encoded = String::with_capacity(session_key.len());
    for byte in session_key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&checkpoint.session_key);
        let json = serde_json::to_string_pretty(checkpoint)?;

        // Write beside the target, then rename over it
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        log::debug!(
            "Saved checkpoint for session {} to {}",
            checkpoint.session_key,
            path.display()
        );
        Ok(())
    }

    async fn load(&self, session_key: &str) -> Result<Checkpoint, CheckpointError> {
        let checkpoint = Self::read(&self.path_for(session_key))
            .await?
            .ok_or_else(|| CheckpointError::NotFound(session_key.to_string()))?;
        if checkpoint.session_key != session_key {
            return Err(CheckpointError::KeyMismatch {
                requested: session_key.to_string(),
                stored: checkpoint.session_key,
            });
        }
        Ok(checkpoint)
    }

    async fn delete(&self, session_key: &str) -> Result<bool, CheckpointError> {
        match tokio::fs::remove_file(self.path_for(session_key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            // Removed between read_dir and now
            if let Some(checkpoint) = Self::read(&path).await? {
                keys.push(checkpoint.session_key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::sample;
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints"));
        let checkpoint = sample("wf-42");

        store.save(&checkpoint).await.unwrap();
        assert!(dir.path().join("checkpoints/wf-42.json").exists());

        // A fresh store over the same directory sees the session
        let reopened = FileCheckpointStore::new(dir.path().join("checkpoints"));
        assert_eq!(reopened.load("wf-42").await.unwrap(), checkpoint);
        assert_eq!(reopened.list().await.unwrap(), vec!["wf-42"]);
    }

    #[tokio::test]
    async fn test_missing_directory_and_session() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("absent"));

        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.load("ghost").await.unwrap_err(),
            CheckpointError::NotFound(_)
        ));
        assert!(!store.delete("ghost").await.unwrap());
    }

    #[tokio::test]
    async fn test_session_keys_stay_inside_the_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(&sample("../escape")).await.unwrap();

        assert!(dir.path().join("%2E%2E%2Fescape.json").exists());
        assert_eq!(
            store.load("../escape").await.unwrap().session_key,
            "../escape"
        );
        assert!(store.delete("../escape").await.unwrap());
    }

    #[tokio::test]
    async fn test_similar_keys_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(&sample("team/a")).await.unwrap();
        store.save(&sample("team_a")).await.unwrap();
        store.save(&sample("team%2Fa")).await.unwrap();

        assert_eq!(store.load("team/a").await.unwrap().session_key, "team/a");
        assert_eq!(store.load("team_a").await.unwrap().session_key, "team_a");
        assert_eq!(
            store.load("team%2Fa").await.unwrap().session_key,
            "team%2Fa"
        );
        assert_eq!(
            store.list().await.unwrap(),
            vec!["team%2Fa", "team/a", "team_a"]
        );
    }

    #[tokio::test]
    async fn test_load_rejects_a_file_stored_under_another_key() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        store.save(&sample("alpha")).await.unwrap();
        std::fs::rename(dir.path().join("alpha.json"), dir.path().join("beta.json")).unwrap();

        match store.load("beta").await.unwrap_err() {
            CheckpointError::KeyMismatch { requested, stored } => {
                assert_eq!(requested, "beta");
                assert_eq!(stored, "alpha");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("abc-123_x"), "abc-123_x");
        assert_eq!(encode_key("a/b c"), "a%2Fb%20c");
        assert_eq!(encode_key("50%"), "50%25");
        assert_eq!(encode_key("é"), "%C3%A9");
    }
}

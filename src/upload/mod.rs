//! Upload validation and storage.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::utils::{file_extension, format_file_size, generate_file_id, sanitize_filename};
use crate::{ReelhookError, Result};

/// Why an upload was turned away
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("File size must be less than {limit_mb}MB (got {actual})")]
    TooLarge {
        size: u64,
        limit_mb: u64,
        actual: String,
    },

    #[error("Only {supported} files are supported (got {mime_type})")]
    UnsupportedType { mime_type: String, supported: String },
}

/// Checks a candidate upload against the configured allow-list and ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            allowed_types: config.allowed_types.clone(),
        }
    }
}

impl UploadPolicy {
    fn supported_labels(&self) -> String {
        let labels: Vec<&str> = self.allowed_types.iter().map(|t| mime_label(t)).collect();
        match labels.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [init @ .., last] => format!("{}, and {}", init.join(", "), last),
        }
    }
}

/// Validate an upload by MIME type and byte size.
///
/// The size rule is checked first, so an oversized file of the wrong type is
/// reported as oversized.
pub fn validate_upload(mime_type: &str, size: u64, policy: &UploadPolicy) -> std::result::Result<(), UploadRejection> {
    if size > policy.max_bytes {
        return Err(UploadRejection::TooLarge {
            size,
            limit_mb: policy.max_bytes / (1024 * 1024),
            actual: format_file_size(size),
        });
    }

    if !policy.allowed_types.iter().any(|allowed| allowed == mime_type) {
        return Err(UploadRejection::UnsupportedType {
            mime_type: mime_type.to_string(),
            supported: policy.supported_labels(),
        });
    }

    Ok(())
}

/// Short display name for a video MIME type
fn mime_label(mime_type: &str) -> &str {
    match mime_type {
        "video/mp4" => "MP4",
        "video/quicktime" => "MOV",
        "video/webm" => "WebM",
        "video/avi" | "video/x-msvideo" => "AVI",
        "video/x-matroska" => "MKV",
        other => other,
    }
}

/// Guess a MIME type from a file extension
pub fn mime_type_for_path(path: &Path) -> String {
    let mime = match file_extension(path).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") | Some("qt") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("avi") => "video/avi",
        Some("mkv") => "video/x-matroska",
        Some("wmv") => "video/x-ms-wmv",
        _ => "application/octet-stream",
    };
    mime.to_string()
}

/// A user-selected clip held in memory for the lifetime of a run
#[derive(Clone)]
pub struct UploadedAsset {
    pub content: Arc<[u8]>,
    pub mime_type: String,
    pub size: u64,
    pub name: String,
}

impl std::fmt::Debug for UploadedAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedAsset")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl UploadedAsset {
    pub fn new(content: impl Into<Arc<[u8]>>, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            size: content.len() as u64,
            content,
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    /// Check the size from metadata and the type from the extension before
    /// reading anything, then load the file.
    pub async fn from_path(path: &Path, mime_override: Option<&str>, policy: &UploadPolicy) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot access file {}", path.display()))?;

        if !metadata.is_file() {
            anyhow::bail!("Path is not a file: {}", path.display());
        }

        let mime_type = mime_override
            .map(str::to_string)
            .unwrap_or_else(|| mime_type_for_path(path));
        validate_upload(&mime_type, metadata.len(), policy)?;

        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();

        Ok(Self::new(content, mime_type, name))
    }
}

/// A stored upload addressable by URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub url: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

/// Where uploads are kept so the compositor can read them back
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_and_store(&self, asset: &UploadedAsset) -> Result<StoredFile>;

    /// Drop every stored file; returns how many were removed
    async fn release_all(&self) -> Result<usize>;
}

/// Stores uploads as files in a directory and hands out `file://` URLs
pub struct LocalMediaStore {
    dir: PathBuf,
    stored: Mutex<Vec<(StoredFile, PathBuf)>>,
    // Keeps a session directory alive until the store is dropped
    _session_dir: Option<TempDir>,
}

impl LocalMediaStore {
    /// Use `dir` when given, otherwise a temporary directory that lives as long as the store
    pub fn new(dir: Option<&Path>) -> Result<Self> {
        let (dir, session_dir) = match dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                (dir.to_path_buf(), None)
            }
            None => {
                let temp = TempDir::new().context("Failed to create temporary directory")?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };

        Ok(Self {
            dir,
            stored: Mutex::new(Vec::new()),
            _session_dir: session_dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn get(&self, id: &str) -> Option<StoredFile> {
        self.stored
            .lock()
            .await
            .iter()
            .find(|(file, _)| file.id == id)
            .map(|(file, _)| file.clone())
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut stored = self.stored.lock().await;
        let Some(position) = stored.iter().position(|(file, _)| file.id == id) else {
            return Ok(false);
        };

        let (_, path) = stored.remove(position);
        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        Ok(true)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload_and_store(&self, asset: &UploadedAsset) -> Result<StoredFile> {
        let id = generate_file_id();
        let file_name = format!("{}_{}", id, sanitize_filename(&asset.name));
        let path = self.dir.join(&file_name);

        tokio::fs::write(&path, &asset.content)
            .await
            .map_err(|e| ReelhookError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

        let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
        let url = url::Url::from_file_path(&absolute)
            .map_err(|_| ReelhookError::Storage(format!("Cannot build a URL for {}", absolute.display())))?;

        let stored = StoredFile {
            id,
            name: file_name,
            url: url.to_string(),
            size: asset.size,
            mime_type: asset.mime_type.clone(),
            uploaded_at: chrono::Utc::now(),
        };

        info!("Stored upload {} ({})", stored.name, format_file_size(stored.size));
        self.stored.lock().await.push((stored.clone(), path));
        Ok(stored)
    }

    async fn release_all(&self) -> Result<usize> {
        let mut stored = self.stored.lock().await;
        let mut kept = Vec::new();
        let mut first_error = None;
        let mut released = 0;

        for (file, path) in std::mem::take(&mut *stored) {
            debug!("Releasing stored upload {}", file.id);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => released += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => released += 1,
                Err(e) => {
                    warn!("Failed to release {}: {}", path.display(), e);
                    first_error.get_or_insert_with(|| format!("Failed to delete {}: {}", path.display(), e));
                    kept.push((file, path));
                }
            }
        }

        // Failed entries stay tracked so a later release can retry them
        *stored = kept;
        match first_error {
            Some(message) => Err(ReelhookError::Storage(message).into()),
            None => Ok(released),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_accepts_allowed_type_within_limit() {
        let policy = UploadPolicy::default();
        assert!(validate_upload("video/mp4", 10 * MB, &policy).is_ok());
        assert!(validate_upload("video/quicktime", 100 * MB, &policy).is_ok());
    }

    #[test]
    fn test_rejects_oversized_file_naming_the_limit() {
        let err = validate_upload("video/mp4", 150 * MB, &UploadPolicy::default()).unwrap_err();
        assert!(matches!(err, UploadRejection::TooLarge { limit_mb: 100, .. }));
        assert!(err.to_string().contains("100MB"));
    }

    #[test]
    fn test_rejects_unsupported_type_naming_the_allow_list() {
        let err = validate_upload("video/x-matroska", MB, &UploadPolicy::default()).unwrap_err();
        assert!(matches!(err, UploadRejection::UnsupportedType { .. }));
        assert_eq!(
            err.to_string(),
            "Only MP4, MOV, WebM, and AVI files are supported (got video/x-matroska)"
        );
    }

    #[test]
    fn test_size_rule_reported_first() {
        let err = validate_upload("image/png", 500 * MB, &UploadPolicy::default()).unwrap_err();
        assert!(matches!(err, UploadRejection::TooLarge { .. }));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let policy = UploadPolicy::default();
        assert!(validate_upload("video/webm", 100 * MB, &policy).is_ok());
        assert!(validate_upload("video/webm", 100 * MB + 1, &policy).is_err());
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("a.MP4")), "video/mp4");
        assert_eq!(mime_type_for_path(Path::new("a.mov")), "video/quicktime");
        assert_eq!(mime_type_for_path(Path::new("a.avi")), "video/avi");
        assert_eq!(mime_type_for_path(Path::new("a")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_path_rejects_before_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.mp4");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(150 * MB).unwrap();

        let err = UploadedAsset::from_path(&path, None, &UploadPolicy::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("100MB"));
    }

    #[tokio::test]
    async fn test_store_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(Some(dir.path())).unwrap();
        let asset = UploadedAsset::new(vec![1u8, 2, 3], "video/mp4", "my clip.mp4");

        let stored = store.upload_and_store(&asset).await.unwrap();
        assert!(stored.id.starts_with("file_"));
        assert!(stored.name.ends_with("_my_clip.mp4"));
        assert!(stored.url.starts_with("file://"));
        assert_eq!(stored.size, 3);
        assert!(dir.path().join(&stored.name).exists());
        assert_eq!(store.get(&stored.id).await, Some(stored.clone()));

        assert_eq!(store.release_all().await.unwrap(), 1);
        assert!(!dir.path().join(&stored.name).exists());
        assert!(store.get(&stored.id).await.is_none());
    }

    #[tokio::test]
    async fn test_delete_single_file() {
        let store = LocalMediaStore::new(None).unwrap();
        let asset = UploadedAsset::new(vec![0u8; 8], "video/webm", "a.webm");
        let stored = store.upload_and_store(&asset).await.unwrap();

        assert!(store.delete(&stored.id).await.unwrap());
        assert!(!store.delete(&stored.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_keeps_failed_entries_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(Some(dir.path())).unwrap();
        let first = store
            .upload_and_store(&UploadedAsset::new(vec![1u8], "video/mp4", "a.mp4"))
            .await
            .unwrap();
        let second = store
            .upload_and_store(&UploadedAsset::new(vec![2u8], "video/mp4", "b.mp4"))
            .await
            .unwrap();

        // A directory in place of the first file makes remove_file fail
        let blocked = dir.path().join(&first.name);
        std::fs::remove_file(&blocked).unwrap();
        std::fs::create_dir(&blocked).unwrap();

        assert!(store.release_all().await.is_err());
        assert!(!dir.path().join(&second.name).exists());
        assert!(store.get(&second.id).await.is_none());
        assert!(store.get(&first.id).await.is_some());

        std::fs::remove_dir(&blocked).unwrap();
        assert_eq!(store.release_all().await.unwrap(), 1);
        assert!(store.get(&first.id).await.is_none());
    }
}

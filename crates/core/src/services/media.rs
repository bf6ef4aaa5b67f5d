//! Media upload gateway.
//!
//! Turns in-memory file buffers into public URLs through a [`StorageBackend`].

use std::sync::Arc;

use agora_common::{
    AppError, AppResult, StorageBackend, UploadedFile, config::MediaConfig, generate_storage_key,
};
use bytes::Bytes;
use futures::future::join_all;

/// A file received from a client, held in memory.
#[derive(Debug, Clone)]
pub struct MediaFile {
    /// Original file name as sent by the client.
    pub file_name: String,
    /// Declared MIME type.
    pub content_type: String,
    /// File contents.
    pub data: Bytes,
}

impl MediaFile {
    /// Create a media file.
    #[must_use]
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Which uploads are accepted.
#[derive(Debug, Clone)]
pub struct MediaPolicy {
    allowed_types: Vec<String>,
    max_file_size: usize,
    max_files: usize,
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

impl From<&MediaConfig> for MediaPolicy {
    fn from(config: &MediaConfig) -> Self {
        Self {
            allowed_types: config.allowed_types.clone(),
            max_file_size: config.max_file_size,
            max_files: config.max_files,
        }
    }
}

impl MediaPolicy {
    /// Maximum number of files in one batch.
    #[must_use]
    pub const fn max_files(&self) -> usize {
        self.max_files
    }

    /// Maximum size of one file in bytes.
    #[must_use]
    pub const fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    /// Check a single file's type and size.
    pub fn check_file(&self, file: &MediaFile) -> AppResult<()> {
        if !self
            .allowed_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&file.content_type))
        {
            return Err(AppError::UnsupportedMediaType(
                "Only jpeg, jpg, png and mp4 are allowed".to_string(),
            ));
        }

        if file.data.len() > self.max_file_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File {} exceeds the {} byte limit",
                file.file_name, self.max_file_size
            )));
        }

        Ok(())
    }

    /// Check a whole batch.
    pub fn check(&self, files: &[MediaFile]) -> AppResult<()> {
        if files.len() > self.max_files {
            return Err(AppError::BadRequest(format!(
                "At most {} files can be uploaded at once",
                self.max_files
            )));
        }

        files.iter().try_for_each(|file| self.check_file(file))
    }
}

/// An uploaded file: its storage key and public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub key: String,
    pub url: String,
}

impl From<UploadedFile> for StoredMedia {
    fn from(file: UploadedFile) -> Self {
        Self {
            key: file.key,
            url: file.url,
        }
    }
}

/// Public URLs of `media`, in order.
#[must_use]
pub fn urls(media: &[StoredMedia]) -> Vec<String> {
    media.iter().map(|m| m.url.clone()).collect()
}

/// Uploads media and returns where it landed.
#[async_trait::async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload `files` under `folder`. Results come back in input order.
    ///
    /// Either every file is stored or none is: a failed batch removes the files that
    /// did make it before returning the error.
    async fn upload(&self, folder: &str, files: Vec<MediaFile>) -> AppResult<Vec<StoredMedia>>;

    /// Remove media whose owning row was never written. Failures are logged.
    async fn discard(&self, media: &[StoredMedia]);
}

/// Shared handle to the configured uploader.
pub type MediaGateway = Arc<dyn MediaUploader>;

/// [`MediaUploader`] writing through a [`StorageBackend`].
pub struct StorageMediaUploader {
    storage: Arc<dyn StorageBackend>,
    policy: MediaPolicy,
}

impl StorageMediaUploader {
    /// Create an uploader over `storage` enforcing `policy`.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, policy: MediaPolicy) -> Self {
        Self { storage, policy }
    }
}

#[async_trait::async_trait]
impl MediaUploader for StorageMediaUploader {
    async fn upload(&self, folder: &str, files: Vec<MediaFile>) -> AppResult<Vec<StoredMedia>> {
        self.policy.check(&files)?;

        let uploads = files.iter().map(|file| {
            let key = generate_storage_key(folder, &file.file_name);
            let storage = self.storage.clone();
            async move { storage.upload(&key, &file.data).await }
        });

        let mut stored = Vec::with_capacity(files.len());
        let mut failure = None;
        for result in join_all(uploads).await {
            match result {
                Ok(file) => stored.push(StoredMedia::from(file)),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            tracing::error!(
                error = %e,
                folder = %folder,
                stored = stored.len(),
                "Media upload failed"
            );
            self.discard(&stored).await;
            return Err(e);
        }

        tracing::debug!(folder = %folder, count = stored.len(), "Uploaded media");
        Ok(stored)
    }

    async fn discard(&self, media: &[StoredMedia]) {
        let removals = media.iter().map(|m| async move {
            if let Err(e) = self.storage.delete(&m.key).await {
                tracing::warn!(error = %e, key = %m.key, "Failed to remove orphaned media");
            }
        });
        join_all(removals).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStorage {
        keys: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        attempts: Mutex<usize>,
        fail_at: Option<usize>,
    }

    #[async_trait::async_trait]
    impl StorageBackend for MemoryStorage {
        async fn upload(&self, key: &str, _data: &[u8]) -> AppResult<UploadedFile> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                *attempts += 1;
                *attempts - 1
            };
            if self.fail_at == Some(attempt) {
                return Err(AppError::Storage("bucket unavailable".to_string()));
            }
            self.keys.lock().unwrap().push(key.to_string());
            Ok(UploadedFile {
                key: key.to_string(),
                url: self.public_url(key),
            })
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://cdn.test/{key}")
        }
    }

    fn png(name: &str) -> MediaFile {
        MediaFile::new(name, "image/png", Bytes::from_static(b"\x89PNG"))
    }

    #[tokio::test]
    async fn test_upload_returns_urls_in_order() {
        let storage = Arc::new(MemoryStorage::default());
        let uploader = StorageMediaUploader::new(storage.clone(), MediaPolicy::default());

        let stored = uploader
            .upload("users/u1/posts/p1", vec![png("a.png"), png("b.png")])
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert!(stored[0].url.starts_with("https://cdn.test/users/u1/posts/p1/"));
        assert!(urls(&stored).iter().all(|u| u.ends_with(".png")));
        assert_eq!(
            *storage.keys.lock().unwrap(),
            vec![stored[0].key.clone(), stored[1].key.clone()]
        );
    }

    #[tokio::test]
    async fn test_upload_propagates_storage_errors() {
        let storage = Arc::new(MemoryStorage {
            fail_at: Some(0),
            ..Default::default()
        });
        let uploader = StorageMediaUploader::new(storage, MediaPolicy::default());

        let err = uploader
            .upload("users/u1/avatar", vec![png("a.png")])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_partial_upload_removes_stored_files() {
        let storage = Arc::new(MemoryStorage {
            fail_at: Some(1),
            ..Default::default()
        });
        let uploader = StorageMediaUploader::new(storage.clone(), MediaPolicy::default());

        let err = uploader
            .upload(
                "users/u1/posts/p1",
                vec![png("a.png"), png("b.png"), png("c.png")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Storage(_)));
        let mut stored = storage.keys.lock().unwrap().clone();
        let mut deleted = storage.deleted.lock().unwrap().clone();
        stored.sort();
        deleted.sort();
        assert_eq!(stored.len(), 2);
        assert_eq!(deleted, stored);
    }

    #[tokio::test]
    async fn test_discard_deletes_every_key() {
        let storage = Arc::new(MemoryStorage::default());
        let uploader = StorageMediaUploader::new(storage.clone(), MediaPolicy::default());
        let media = [
            StoredMedia {
                key: "users/u1/avatar/a.png".to_string(),
                url: "https://cdn.test/users/u1/avatar/a.png".to_string(),
            },
            StoredMedia {
                key: "users/u1/avatar/b.png".to_string(),
                url: "https://cdn.test/users/u1/avatar/b.png".to_string(),
            },
        ];

        uploader.discard(&media).await;

        assert_eq!(
            *storage.deleted.lock().unwrap(),
            vec!["users/u1/avatar/a.png", "users/u1/avatar/b.png"]
        );
    }

    #[test]
    fn test_policy_rejects_unsupported_type() {
        let gif = MediaFile::new("a.gif", "image/gif", Bytes::from_static(b"GIF8"));
        let err = MediaPolicy::default().check(&[gif]).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_policy_accepts_mp4_and_jpg() {
        let files = [
            MediaFile::new("clip.mp4", "video/mp4", Bytes::from_static(b"....")),
            MediaFile::new("a.jpg", "image/jpg", Bytes::from_static(b"....")),
            MediaFile::new("b.jpeg", "IMAGE/JPEG", Bytes::from_static(b"....")),
        ];
        assert!(MediaPolicy::default().check(&files).is_ok());
    }

    #[test]
    fn test_policy_limits() {
        let policy = MediaPolicy::from(&MediaConfig {
            max_file_size: 3,
            max_files: 1,
            allowed_types: vec!["image/png".to_string()],
        });

        let err = policy.check(&[png("a.png")]).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));

        let small = MediaFile::new("a.png", "image/png", Bytes::from_static(b"ok"));
        let err = policy.check(&[small.clone(), small]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}

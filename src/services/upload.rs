use crate::ports::{StoredFile, UploadError, UploadFile, Uploader};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Accepted proof-of-payment and evidence image types, with the extension they are stored under.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/jpg", "jpg"),
];

pub fn extension_for(mime_type: &str) -> Option<&'static str> {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == mime_type)
        .map(|(_, ext)| *ext)
}

/// Stores uploads on local disk; files are served back under `/uploads`.
#[derive(Debug, Clone)]
pub struct LocalUploader {
    dir: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalUploader {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn check(&self, file: &UploadFile) -> Result<&'static str, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if file.bytes.len() > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: file.bytes.len(),
                max: self.max_bytes,
            });
        }
        extension_for(&file.mime_type)
            .ok_or_else(|| UploadError::DisallowedType(file.mime_type.clone()))
    }
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, file: UploadFile) -> Result<StoredFile, UploadError> {
        let ext = self.check(&file)?;
        let stored_name = format!("{}.{}", Uuid::new_v4(), ext);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;
        tokio::fs::write(self.dir.join(&stored_name), &file.bytes)
            .await
            .map_err(|e| UploadError::Storage(e.to_string()))?;

        tracing::info!(
            stored_name = %stored_name,
            size = file.bytes.len(),
            mime_type = %file.mime_type,
            "File uploaded"
        );

        Ok(StoredFile {
            url: format!("{}/uploads/{}", self.public_base_url, stored_name),
            size: file.bytes.len(),
            mime_type: file.mime_type,
            original_name: file.original_name,
            stored_name,
        })
    }

    async fn remove(&self, stored_name: &str) -> bool {
        // Only names this uploader produced; never follow a path out of the upload dir.
        if stored_name.contains('/') || stored_name.contains('\\') || stored_name.starts_with('.') {
            return false;
        }
        match tokio::fs::remove_file(self.dir.join(stored_name)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(stored_name, error = %e, "Failed to remove uploaded file");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(bytes: usize) -> UploadFile {
        UploadFile {
            bytes: vec![0x89; bytes],
            mime_type: "image/png".into(),
            original_name: "receipt.png".into(),
        }
    }

    #[tokio::test]
    async fn stores_allowed_image() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalUploader::new(dir.path(), "http://localhost:3000/", 1024);

        let stored = uploader.upload(png(10)).await.unwrap();
        assert!(stored.stored_name.ends_with(".png"));
        assert_eq!(
            stored.url,
            format!("http://localhost:3000/uploads/{}", stored.stored_name)
        );
        assert_eq!(stored.size, 10);
        assert!(dir.path().join(&stored.stored_name).exists());

        assert!(uploader.remove(&stored.stored_name).await);
        assert!(!dir.path().join(&stored.stored_name).exists());
    }

    #[tokio::test]
    async fn rejects_disallowed_oversize_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalUploader::new(dir.path(), "http://localhost", 16);

        let mut pdf = png(4);
        pdf.mime_type = "application/pdf".into();
        assert!(matches!(
            uploader.upload(pdf).await,
            Err(UploadError::DisallowedType(_))
        ));
        assert!(matches!(
            uploader.upload(png(17)).await,
            Err(UploadError::TooLarge { size: 17, max: 16 })
        ));
        assert!(matches!(uploader.upload(png(0)).await, Err(UploadError::Empty)));
    }

    #[tokio::test]
    async fn remove_refuses_paths() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = LocalUploader::new(dir.path(), "http://localhost", 16);
        assert!(!uploader.remove("../etc/passwd").await);
        assert!(!uploader.remove("missing.png").await);
    }

    #[test]
    fn jpeg_aliases_share_extension() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/JPG"), Some("jpg"));
        assert_eq!(extension_for("image/gif"), None);
    }
}

use super::VerificationError;
use async_trait::async_trait;
use std::{
    fmt,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// A still frame taken for verification.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl CapturedImage {
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Capture source used by the challenge.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Ask for camera access; `true` once granted.
    async fn request_permission(&self) -> bool;

    async fn capture(&self) -> Result<CapturedImage, VerificationError>;
}

/// Reads the "captured" frame from an image file.
#[derive(Debug, Clone)]
pub struct FileCamera {
    path: PathBuf,
}

impl FileCamera {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn request_permission(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .is_ok_and(|metadata| metadata.is_file())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn capture(&self) -> Result<CapturedImage, VerificationError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|err| VerificationError::Capture(err.to_string()))?;
        if bytes.is_empty() {
            return Err(VerificationError::Capture(
                "captured image is empty".to_string(),
            ));
        }
        debug!(len = bytes.len(), "frame captured");
        Ok(CapturedImage::new(bytes, mime_for(&self.path)))
    }
}

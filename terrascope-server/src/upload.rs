// Temp-file guard for uploaded images.

use std::path::{Path, PathBuf};
use terrascope_core::error::Result;
use tracing::warn;
use uuid::Uuid;

/// An uploaded file spooled to disk for the duration of one request.
///
/// Dropping the guard removes the file, so every exit path out of the
/// pipeline (success, validation failure, dispatch failure, panic) releases
/// the temp resource exactly once.
#[derive(Debug)]
pub struct TempUpload {
    path: Option<PathBuf>,
}

impl TempUpload {
    /// Write `bytes` under a fresh name inside `dir` and take ownership of
    /// the resulting file.
    pub async fn spool(dir: &Path, original_name: &str, bytes: &[u8]) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        // Keep only the final path component of the client-supplied name.
        let base = Path::new(original_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let path = dir.join(format!("{}-{}", Uuid::new_v4(), base));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path: Some(path) })
    }

    pub fn path(&self) -> &Path {
        self.path
            .as_deref()
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to remove temp upload {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spool_writes_and_drop_removes() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::spool(dir.path(), "field.jpg", b"jpegbytes")
            .await
            .unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"jpegbytes");

        drop(upload);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_spool_strips_path_components_from_client_name() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::spool(dir.path(), "../../etc/passwd", b"x")
            .await
            .unwrap();
        assert_eq!(upload.path().parent().unwrap(), dir.path());
        drop(upload);
    }

    #[tokio::test]
    async fn test_drop_survives_already_removed_file() {
        let dir = tempfile::tempdir().unwrap();
        let upload = TempUpload::spool(dir.path(), "a.png", b"x").await.unwrap();
        std::fs::remove_file(upload.path()).unwrap();
        // Drop only warns when the file is already gone.
        drop(upload);
    }
}

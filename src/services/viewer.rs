use crate::services::playback::{command_parts, release, spawn_on_file};
use crate::utils::media::InlineMedia;
use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::PathBuf;
use tokio::process::Child;
use tokio::sync::Mutex;

/// Full-size view of one generated image. Opening another closes the
/// previous window.
#[derive(Debug)]
pub struct Viewer {
    command: Option<Vec<String>>,
    scratch_dir: PathBuf,
    current: Mutex<Option<Child>>,
}

impl Viewer {
    pub fn new(viewer_command: Option<&str>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command_parts(viewer_command),
            scratch_dir: scratch_dir.into(),
            current: Mutex::new(None),
        }
    }

    /// Writes the image to the scratch folder and opens it. Returns the file path.
    pub async fn show(&self, image: &InlineMedia) -> Result<PathBuf> {
        if !image.is_image() {
            return Err(anyhow!("{} is not an image", image.mime_type));
        }
        let command = self
            .command
            .as_deref()
            .ok_or_else(|| anyhow!("No image viewer configured (image_viewer_command)"))?;

        let bytes = image.decode()?;
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let path = self.scratch_dir.join(format!("view.{}", image.extension()));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        let mut current = self.current.lock().await;
        release(&mut current).await;
        *current = Some(spawn_on_file(command, &path)?);

        info!("Viewing {}", path.display());
        Ok(path)
    }

    pub async fn close(&self) {
        let mut current = self.current.lock().await;
        release(&mut current).await;
    }

    pub async fn is_open(&self) -> bool {
        let mut current = self.current.lock().await;
        match current.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_show_without_command_fails() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let viewer = Viewer::new(None, dir.path());
        let err = viewer
            .show(&InlineMedia::new("image/png", "UE5H"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("image_viewer_command"));
        Ok(())
    }

    #[tokio::test]
    async fn test_show_rejects_non_images() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let viewer = Viewer::new(Some("tail -f"), dir.path());
        assert!(viewer.show(&InlineMedia::new("audio/wav", "AAAA")).await.is_err());
        assert!(!viewer.is_open().await);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_show_writes_file_and_replaces_window() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // Keeps running until killed, like an image window.
        let viewer = Viewer::new(Some("tail -f"), dir.path());

        let path = viewer.show(&InlineMedia::new("image/png", "UE5H")).await?;
        assert_eq!(path, dir.path().join("view.png"));
        assert_eq!(std::fs::read(&path)?, b"PNG");
        assert!(viewer.is_open().await);

        let path = viewer.show(&InlineMedia::new("image/jpeg", "SlBH")).await?;
        assert_eq!(std::fs::read(&path)?, b"JPG");
        assert!(viewer.is_open().await);

        viewer.close().await;
        assert!(!viewer.is_open().await);
        Ok(())
    }
}

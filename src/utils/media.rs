use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base64 payload tagged with its media type, the shape the generation API
/// exchanges for images and audio.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineMedia {
    pub mime_type: String,
    pub data: String,
}

impl InlineMedia {
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, general_purpose::STANDARD.encode(bytes))
    }

    /// Parses `data:<mime>;base64,<payload>`.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Not a data URL"))?;
        let (meta, data) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("Data URL without payload"))?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("Only base64 data URLs are supported"))?;
        if mime_type.is_empty() {
            return Err(anyhow!("Data URL without media type"));
        }
        Ok(Self::new(mime_type, data))
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let mime_type = mime_from_path(path)
            .ok_or_else(|| anyhow!("Unsupported file type: {}", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::from_bytes(mime_type, &bytes))
    }

    /// Accepts either a `data:` URL or a file path.
    pub async fn from_source(source: &str) -> Result<Self> {
        let source = source.trim();
        if source.starts_with("data:") {
            Self::from_data_url(source)
        } else {
            Self::from_path(Path::new(source)).await
        }
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        general_purpose::STANDARD
            .decode(&self.data)
            .with_context(|| format!("Invalid base64 payload for {}", self.mime_type))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_audio(&self) -> bool {
        self.mime_type.starts_with("audio/")
    }

    /// File extension matching the media type, `bin` when unknown.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            "audio/flac" => "flac",
            "audio/mp4" | "audio/x-m4a" => "m4a",
            _ => "bin",
        }
    }
}

pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_parsing() -> Result<()> {
        let media = InlineMedia::from_data_url("data:image/png;base64,iVBORw0KGgo=")?;
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.data, "iVBORw0KGgo=");
        assert_eq!(media.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");
        assert!(media.is_image());
        assert_eq!(media.extension(), "png");
        Ok(())
    }

    #[test]
    fn test_data_url_rejects_malformed() {
        assert!(InlineMedia::from_data_url("image/png;base64,AAAA").is_err());
        assert!(InlineMedia::from_data_url("data:image/png;base64").is_err());
        assert!(InlineMedia::from_data_url("data:text/plain,hello").is_err());
        assert!(InlineMedia::from_data_url("data:;base64,AAAA").is_err());
    }

    #[tokio::test]
    async fn test_from_source_accepts_url_or_path() -> Result<()> {
        let url = InlineMedia::from_source(" data:audio/wav;base64,UklGRg== ").await?;
        assert_eq!(url.mime_type, "audio/wav");

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("face.JPG");
        std::fs::write(&path, b"jpeg")?;
        let file = InlineMedia::from_source(&path.to_string_lossy()).await?;
        assert_eq!(file.mime_type, "image/jpeg");
        assert_eq!(file.decode()?, b"jpeg");

        assert!(InlineMedia::from_source("notes.txt").await.is_err());
        Ok(())
    }

    #[test]
    fn test_serializes_camel_case() -> Result<()> {
        let media = InlineMedia::from_bytes("audio/mpeg", b"abc");
        let json = serde_json::to_value(&media)?;
        assert_eq!(json["mimeType"], "audio/mpeg");
        assert_eq!(json["data"], "YWJj");
        assert_eq!(media.decode()?, b"abc");
        Ok(())
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path(Path::new("face.JPG")), Some("image/jpeg"));
        assert_eq!(mime_from_path(Path::new("voice.mp3")), Some("audio/mpeg"));
        assert_eq!(mime_from_path(Path::new("notes.txt")), None);
        assert_eq!(mime_from_path(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_from_path_reads_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ref.png");
        std::fs::write(&path, [1u8, 2, 3])?;

        let media = InlineMedia::from_path(&path).await?;
        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.decode()?, vec![1, 2, 3]);

        assert!(InlineMedia::from_path(&dir.path().join("ref.txt")).await.is_err());
        Ok(())
    }
}

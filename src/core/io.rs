use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

/// Where exported assets end up.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Storage for NativeStorage {
    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write {}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parent_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = NativeStorage::new();
        let nested = dir.path().join("a/b/file.bin");

        storage.write(&nested.to_string_lossy(), b"payload").await?;
        assert_eq!(std::fs::read(&nested)?, b"payload");

        storage.write(&nested.to_string_lossy(), b"second").await?;
        assert_eq!(std::fs::read(&nested)?, b"second");
        Ok(())
    }
}

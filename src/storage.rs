use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::fs;

use crate::config::StorageConfig;

pub mod gcs;

pub use gcs::GcsBlobStore;

/// Opaque key/value object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()>;

    /// `Ok(None)` when no object exists under `key`.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Human-readable location of `key`, for logs.
    fn uri(&self, key: &str) -> String;
}

pub fn open(config: &StorageConfig) -> anyhow::Result<Arc<dyn BlobStore>> {
    match config {
        StorageConfig::Local { root } => Ok(Arc::new(LocalFsBlobStore::new(root.clone()))),
        StorageConfig::Gcs(gcs) => {
            let store = GcsBlobStore::new(gcs.clone()).context("build gcs blob store")?;
            Ok(Arc::new(store))
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsBlobStore {
    root: PathBuf,
}

impl LocalFsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if segment == ".." {
                anyhow::bail!("object key must not contain '..': {key}");
            }
            path = path.join(segment);
        }
        if path == self.root {
            anyhow::bail!("object key is empty: {key:?}");
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStore for LocalFsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> anyhow::Result<()> {
        let path = self.object_path(key)?;
        write_atomic(&path, &bytes).await
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", path.display())),
        }
    }

    fn uri(&self, key: &str) -> String {
        match self.object_path(key) {
            Ok(path) => format!("file://{}", path.display()),
            Err(_) => format!("file://{}/{key}", self.root.display()),
        }
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

/// In-process store; contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: tokio::sync::Mutex<BTreeMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|(_, content_type)| content_type.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> anyhow::Result<()> {
        self.objects
            .lock()
            .await
            .insert(key.to_owned(), (bytes, content_type.to_owned()));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .objects
            .lock()
            .await
            .get(key)
            .map(|(bytes, _)| bytes.clone()))
    }

    fn uri(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_fs_get_of_missing_key_is_none() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFsBlobStore::new(dir.path());
        assert!(store.get("vinted_products_20240101.json").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn local_fs_put_creates_nested_dirs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = LocalFsBlobStore::new(dir.path());
        store
            .put("images/abc_image_1.jpg", vec![1, 2, 3], "image/jpeg")
            .await?;
        assert_eq!(
            std::fs::read(dir.path().join("images").join("abc_image_1.jpg"))?,
            vec![1, 2, 3]
        );
        assert_eq!(
            store.get("images/abc_image_1.jpg").await?,
            Some(vec![1, 2, 3])
        );
        Ok(())
    }

    #[tokio::test]
    async fn local_fs_rejects_parent_segments() {
        let store = LocalFsBlobStore::new("data");
        let err = store
            .put("../escape.json", Vec::new(), "application/json")
            .await
            .expect_err("parent segment rejected");
        assert!(err.to_string().contains(".."));
    }

    #[tokio::test]
    async fn memory_store_keeps_content_type() -> anyhow::Result<()> {
        let store = MemoryBlobStore::new();
        store.put("a.json", b"[]".to_vec(), "application/json").await?;
        assert_eq!(
            store.content_type("a.json").await.as_deref(),
            Some("application/json")
        );
        assert_eq!(store.keys().await, vec!["a.json".to_owned()]);
        Ok(())
    }
}

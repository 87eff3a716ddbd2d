use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{BlobStore, validate_key};

/// Filesystem-backed blob store rooted at a single directory.
///
/// `rename` maps to `rename(2)`, which is atomic as long as the root stays on
/// one device.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        debug!("Opened filesystem store at {}", root.display());
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn exists(&self, key: &str) -> io::Result<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_for(key)?;
        fs::write(&path, bytes).await
    }

    async fn rename(&self, src: &str, dst: &str) -> io::Result<()> {
        let src = self.path_for(src)?;
        let dst = self.path_for(dst)?;
        fs::rename(&src, &dst).await
    }

    async fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && name.starts_with(prefix)
            {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        fs::remove_file(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();

        assert!(!store.exists("ark-1.0.1.tgz").await.unwrap());
        store.put("ark-1.0.1.tgz", b"chart bytes").await.unwrap();
        assert!(store.exists("ark-1.0.1.tgz").await.unwrap());
        assert_eq!(
            store.get("ark-1.0.1.tgz").await.unwrap().unwrap(),
            b"chart bytes"
        );
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        assert!(store.get("missing.tgz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rename_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();

        store.put("index.yaml", b"old").await.unwrap();
        store.put("index.yaml.stage", b"new").await.unwrap();
        store.rename("index.yaml.stage", "index.yaml").await.unwrap();

        assert_eq!(store.get("index.yaml").await.unwrap().unwrap(), b"new");
        assert!(!store.exists("index.yaml.stage").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();

        store.put("ark-1.0.1.tgz", b"a").await.unwrap();
        store.put("ark-1.2.0.tgz", b"b").await.unwrap();
        store.put("tomcat-0.4.1.tgz", b"c").await.unwrap();

        let keys = store.list("ark-").await.unwrap();
        assert_eq!(keys, vec!["ark-1.0.1.tgz", "ark-1.2.0.tgz"]);

        let all = store.list("").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_traversal_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        assert!(store.put("../escape", b"x").await.is_err());
    }
}

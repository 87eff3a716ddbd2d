pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::io;

/// Key/value blob storage the repository runs against.
///
/// Keys are flat strings (`index.yaml`, `{name}-{version}.tgz`); `rename` is
/// the atomic commit primitive for index rewrites.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, key: &str) -> io::Result<bool>;

    /// Fetch a blob, `None` when the key is absent.
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

    /// Atomically move `src` over `dst`, replacing any existing blob.
    async fn rename(&self, src: &str, dst: &str) -> io::Result<()>;

    /// List keys starting with `prefix` (empty prefix lists everything).
    async fn list(&self, prefix: &str) -> io::Result<Vec<String>>;

    async fn delete(&self, key: &str) -> io::Result<()>;
}

/// Reject keys that would escape a filesystem-backed root.
pub(crate) fn validate_key(key: &str) -> io::Result<()> {
    if key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key == "."
        || key == ".."
    {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid blob key: {:?}", key),
        ));
    }
    Ok(())
}

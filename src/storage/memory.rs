use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::sync::RwLock;

use super::BlobStore;

/// In-memory blob store used by tests and ephemeral deployments.
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned lock means a panicking writer; the map itself is still valid
        self.blobs.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, key: &str) -> io::Result<bool> {
        Ok(self.lock().contains_key(key))
    }

    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn rename(&self, src: &str, dst: &str) -> io::Result<()> {
        let mut blobs = self.lock();
        match blobs.remove(src) {
            Some(bytes) => {
                blobs.insert(dst.to_string(), bytes);
                Ok(())
            },
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such key: {}", src),
            )),
        }
    }

    async fn list(&self, prefix: &str) -> io::Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        match self.lock().remove(key) {
            Some(_) => Ok(()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such key: {}", key),
            )),
        }
    }
}

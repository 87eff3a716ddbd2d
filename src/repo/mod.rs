//! Add/delete orchestration against the blob store.
//!
//! Every index mutation runs read-snapshot → temp-staged rewrite → atomic
//! commit (a store `rename`), serialized on one process-wide mutex. Blob
//! uploads and all reads stay lock-free: readers observe the pre- or
//! post-commit index atomically.

use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chart::{ChartArchive, chart_filename};
use crate::config::BasicAuth;
use crate::error::RepoError;
use crate::index::rewrite::{
    DeleteTarget, PendingCharts, rewrite_add, rewrite_delete, scan_versions,
};
use crate::index::{EMPTY_INDEX, INDEX_KEY, INDEX_STAGE_KEY, update};
use crate::metrics::{INDEX_REWRITE_DURATION, INDEX_REWRITES_TOTAL};
use crate::storage::BlobStore;

pub struct ChartRepo {
    store: Arc<dyn BlobStore>,
    base_url: String,
    auth: Option<BasicAuth>,
    index_lock: Mutex<()>,
}

impl ChartRepo {
    pub fn new(
        store: Arc<dyn BlobStore>,
        base_url: impl Into<String>,
        auth: Option<BasicAuth>,
    ) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            auth,
            index_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> Option<&BasicAuth> {
        self.auth.as_ref()
    }

    /// The live index bytes, or `None` before the first write.
    pub async fn index_bytes(&self) -> Result<Option<Vec<u8>>, RepoError> {
        Ok(self.store.get(INDEX_KEY).await?)
    }

    /// Index the stored blobs at `keys`, all at once.
    ///
    /// Either every requested chart appears in the next index version or none
    /// does. A chart already indexed with the same digest is skipped; one
    /// indexed with a different digest fails with `AlreadyPresent` before any
    /// output is produced.
    pub async fn add(&self, keys: &[String]) -> Result<Vec<(String, String)>, RepoError> {
        let _guard = self.index_lock.lock().await;

        let mut pending = PendingCharts::new();
        for key in keys {
            let bytes = self
                .store
                .get(key)
                .await?
                .ok_or_else(|| RepoError::NotFound(key.clone()))?;
            let archive = ChartArchive::parse(bytes)?;
            pending.insert(archive.version_record(&self.base_url))?;
        }

        let snapshot = self.index_snapshot().await?;

        for existing in scan_versions(snapshot.as_slice()).await? {
            let Some(records) = pending.get(&existing.name) else {
                continue;
            };
            let Some(record) = records
                .iter()
                .find(|r| r.version() == Some(existing.version.as_str()))
            else {
                continue;
            };
            if record.digest == existing.digest {
                debug!(
                    "{} {} already indexed with matching digest, skipping",
                    existing.name, existing.version
                );
                pending.remove_version(&existing.name, &existing.version);
            } else {
                return Err(RepoError::AlreadyPresent {
                    name: existing.name.clone(),
                    version: existing.version.clone(),
                });
            }
        }

        if pending.is_empty() {
            debug!("all charts already indexed, leaving index.yaml untouched");
            return Ok(Vec::new());
        }

        let timer = INDEX_REWRITE_DURATION.start_timer();
        let staging = tempfile::tempdir()?;
        let source = staging.path().join("source.yaml");
        let out = staging.path().join("out.yaml");
        tokio::fs::write(&source, &snapshot).await?;

        let reader = BufReader::new(File::open(&source).await?);
        let writer = BufWriter::new(File::create(&out).await?);
        let outcome = rewrite_add(reader, writer, pending).await?;

        let rewritten = tokio::fs::read(&out).await?;
        self.commit_index(&rewritten).await?;
        timer.observe_duration();
        INDEX_REWRITES_TOTAL.inc();

        info!("Indexed {} chart version(s)", outcome.added.len());
        Ok(outcome.added)
    }

    /// Remove the targeted versions from the index, then their blobs.
    ///
    /// Requires the live index to exist. Returns the blob keys removed;
    /// `NotFound` when no target matched, with the live index untouched.
    pub async fn delete(&self, targets: &[DeleteTarget]) -> Result<Vec<String>, RepoError> {
        let _guard = self.index_lock.lock().await;

        let Some(snapshot) = self.store.get(INDEX_KEY).await? else {
            return Err(RepoError::IndexMissing);
        };

        let timer = INDEX_REWRITE_DURATION.start_timer();
        let staging = tempfile::tempdir()?;
        let source = staging.path().join("source.yaml");
        let out = staging.path().join("out.yaml");
        tokio::fs::write(&source, &snapshot).await?;

        let reader = BufReader::new(File::open(&source).await?);
        let writer = BufWriter::new(File::create(&out).await?);
        let outcome = rewrite_delete(reader, writer, targets).await?;

        if outcome.removed.is_empty() {
            return Err(RepoError::NotFound(describe_targets(targets)));
        }

        let rewritten = tokio::fs::read(&out).await?;
        self.commit_index(&rewritten).await?;
        timer.observe_duration();
        INDEX_REWRITES_TOTAL.inc();

        // Blob cleanup follows the successful commit; failures here are
        // logged and never override the outcome
        let mut removed_keys = Vec::new();
        for (name, version) in &outcome.removed {
            let key = chart_filename(name, version);
            match self.store.delete(&key).await {
                Ok(()) => removed_keys.push(key),
                Err(e) => warn!("Failed to delete blob {}: {}", key, e),
            }
        }

        info!("Removed {} chart version(s)", outcome.removed.len());
        Ok(removed_keys)
    }

    /// Store a single uploaded archive and, unless `update_index` is off,
    /// fold it into the index through the full-load path.
    pub async fn push(&self, archive: &ChartArchive, update_index: bool) -> Result<(), RepoError> {
        self.store
            .put(&archive.filename(), archive.bytes())
            .await?;
        debug!("Stored chart blob {}", archive.filename());

        if !update_index {
            return Ok(());
        }

        let _guard = self.index_lock.lock().await;
        let current = self.store.get(INDEX_KEY).await?;
        match update::apply_archive(current.as_deref(), archive, &self.base_url)? {
            Some(document) => {
                self.commit_index(document.as_bytes()).await?;
                info!("Indexed {} {}", archive.name(), archive.version());
            },
            None => debug!(
                "{} {} already indexed with matching digest, skipping",
                archive.name(),
                archive.version()
            ),
        }
        Ok(())
    }

    /// Fold every stored `.tgz` under `prefix` that the index does not know
    /// yet into the index. Blobs already indexed with a matching digest are
    /// skipped.
    pub async fn batch_update(&self, prefix: &str) -> Result<Vec<(String, String)>, RepoError> {
        let keys: Vec<String> = self
            .store
            .list(prefix)
            .await?
            .into_iter()
            .filter(|k| k.ends_with(".tgz"))
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.add(&keys).await
    }

    async fn index_snapshot(&self) -> Result<Vec<u8>, RepoError> {
        Ok(self
            .store
            .get(INDEX_KEY)
            .await?
            .unwrap_or_else(|| EMPTY_INDEX.as_bytes().to_vec()))
    }

    /// Commit rewritten index bytes: stage, then atomically rename over the
    /// live key. Readers see either the old or the new document, never a mix.
    async fn commit_index(&self, bytes: &[u8]) -> Result<(), RepoError> {
        self.store.put(INDEX_STAGE_KEY, bytes).await?;
        self.store.rename(INDEX_STAGE_KEY, INDEX_KEY).await?;
        Ok(())
    }
}

fn describe_targets(targets: &[DeleteTarget]) -> String {
    targets
        .iter()
        .map(|t| match t {
            DeleteTarget::Chart(name) => name.clone(),
            DeleteTarget::Version(name, version) => chart_filename(name, version),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Index;
    use crate::storage::MemoryStore;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn tgz(name: &str, version: &str) -> Vec<u8> {
        let chart_yaml = format!("name: {}\nversion: {}\n", name, version);
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path(format!("{}/Chart.yaml", name)).unwrap();
        header.set_size(chart_yaml.len() as u64);
        header.set_cksum();
        builder.append(&header, chart_yaml.as_bytes()).unwrap();
        let tar_data = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_data).unwrap();
        encoder.finish().unwrap()
    }

    fn repo_with_store() -> (ChartRepo, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let repo = ChartRepo::new(store.clone(), "http://charts.example.com/", None);
        (repo, store)
    }

    async fn seed_blob(store: &MemoryStore, name: &str, version: &str) -> String {
        let key = chart_filename(name, version);
        store.put(&key, &tgz(name, version)).await.unwrap();
        key
    }

    async fn live_index(repo: &ChartRepo) -> Index {
        Index::parse(&repo.index_bytes().await.unwrap().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_add_creates_index() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;

        let added = repo.add(&[key]).await.unwrap();
        assert_eq!(added, vec![("ark".to_string(), "1.0.1".to_string())]);

        let index = live_index(&repo).await;
        let record = index.by_chart_and_version("ark", "1.0.1").unwrap();
        assert_eq!(
            record.urls,
            vec!["http://charts.example.com/ark-1.0.1.tgz"]
        );
        assert!(record.created.is_some());
    }

    #[tokio::test]
    async fn test_add_batch_is_atomic() {
        let (repo, store) = repo_with_store();
        let keys = vec![
            seed_blob(&store, "ark", "1.0.1").await,
            seed_blob(&store, "ark", "1.2.0").await,
            seed_blob(&store, "tomcat", "0.4.1").await,
        ];

        let added = repo.add(&keys).await.unwrap();
        assert_eq!(added.len(), 3);

        let index = live_index(&repo).await;
        assert_eq!(index.entries_by_chart("ark").unwrap().len(), 2);
        assert_eq!(index.entries_by_chart("tomcat").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_missing_blob_fails() {
        let (repo, _) = repo_with_store();
        let err = repo.add(&["ghost-1.0.0.tgz".to_string()]).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_same_digest_twice_noops() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;

        repo.add(&[key.clone()]).await.unwrap();
        let before = repo.index_bytes().await.unwrap().unwrap();

        let added = repo.add(&[key]).await.unwrap();
        assert!(added.is_empty());
        // Untouched, not even generated
        assert_eq!(repo.index_bytes().await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_add_conflicting_digest_fails_before_commit() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;
        repo.add(&[key.clone()]).await.unwrap();
        let before = repo.index_bytes().await.unwrap().unwrap();

        // Different bytes under the same (name, version) key
        let mut other = tgz("ark", "1.0.1");
        other.extend_from_slice(&[0u8; 7]);
        store.put(&key, &other).await.unwrap();

        let err = repo.add(&[key]).await.unwrap_err();
        assert!(matches!(err, RepoError::AlreadyPresent { .. }));
        assert_eq!(repo.index_bytes().await.unwrap().unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_by_name_removes_blobs() {
        let (repo, store) = repo_with_store();
        let keys = vec![
            seed_blob(&store, "ark", "1.0.1").await,
            seed_blob(&store, "ark", "1.2.0").await,
            seed_blob(&store, "tomcat", "0.4.1").await,
        ];
        repo.add(&keys).await.unwrap();

        let removed = repo
            .delete(&[DeleteTarget::Chart("ark".to_string())])
            .await
            .unwrap();
        assert_eq!(removed.len(), 2);

        assert!(!store.exists("ark-1.0.1.tgz").await.unwrap());
        assert!(!store.exists("ark-1.2.0.tgz").await.unwrap());
        assert!(store.exists("tomcat-0.4.1.tgz").await.unwrap());

        let index = live_index(&repo).await;
        assert!(index.entries_by_chart("ark").is_none());
        assert!(index.entries_by_chart("tomcat").is_some());
    }

    #[tokio::test]
    async fn test_delete_by_version_keeps_siblings() {
        let (repo, store) = repo_with_store();
        let keys = vec![
            seed_blob(&store, "ark", "1.0.1").await,
            seed_blob(&store, "ark", "1.2.0").await,
        ];
        repo.add(&keys).await.unwrap();

        let removed = repo
            .delete(&[DeleteTarget::Version("ark".to_string(), "1.0.1".to_string())])
            .await
            .unwrap();
        assert_eq!(removed, vec!["ark-1.0.1.tgz"]);

        assert!(store.exists("ark-1.2.0.tgz").await.unwrap());
        let index = live_index(&repo).await;
        let ark = index.entries_by_chart("ark").unwrap();
        assert_eq!(ark.len(), 1);
        assert_eq!(ark[0].version(), Some("1.2.0"));
    }

    #[tokio::test]
    async fn test_delete_without_index_fails() {
        let (repo, _) = repo_with_store();
        let err = repo
            .delete(&[DeleteTarget::Chart("ark".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::IndexMissing));
    }

    #[tokio::test]
    async fn test_delete_unknown_leaves_index_untouched() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;
        repo.add(&[key]).await.unwrap();
        let before = repo.index_bytes().await.unwrap().unwrap();

        let err = repo
            .delete(&[DeleteTarget::Chart("not-exist".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));

        let err = repo
            .delete(&[DeleteTarget::Version("ark".to_string(), "0.0.0".to_string())])
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));

        assert_eq!(repo.index_bytes().await.unwrap().unwrap(), before);
        assert!(store.exists("ark-1.0.1.tgz").await.unwrap());
    }

    #[tokio::test]
    async fn test_push_without_index_update() {
        let (repo, store) = repo_with_store();
        let archive = ChartArchive::parse(tgz("ark", "1.0.1")).unwrap();

        repo.push(&archive, false).await.unwrap();

        assert!(store.exists("ark-1.0.1.tgz").await.unwrap());
        assert!(repo.index_bytes().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_indexes_chart() {
        let (repo, _) = repo_with_store();
        let archive = ChartArchive::parse(tgz("ark", "1.0.1")).unwrap();

        repo.push(&archive, true).await.unwrap();

        let index = live_index(&repo).await;
        let record = index.by_chart_and_version("ark", "1.0.1").unwrap();
        assert_eq!(record.digest, archive.digest());

        // Re-pushing identical bytes is a quiet no-op
        repo.push(&archive, true).await.unwrap();
        let index = live_index(&repo).await;
        assert_eq!(index.entries_by_chart("ark").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_and_add_agree() {
        // The full-load path and the streaming path must index identically
        let (pushed, _) = repo_with_store();
        let archive = ChartArchive::parse(tgz("ark", "1.0.1")).unwrap();
        pushed.push(&archive, true).await.unwrap();

        let (added, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;
        added.add(&[key]).await.unwrap();

        let a = live_index(&pushed).await;
        let b = live_index(&added).await;
        let ra = a.by_chart_and_version("ark", "1.0.1").unwrap();
        let rb = b.by_chart_and_version("ark", "1.0.1").unwrap();
        assert_eq!(ra.urls, rb.urls);
        assert_eq!(ra.digest, rb.digest);
        assert_eq!(ra.manifest, rb.manifest);
    }

    #[tokio::test]
    async fn test_batch_update_indexes_stragglers() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;
        repo.add(&[key]).await.unwrap();

        // A blob that landed without an index entry (failed earlier rewrite)
        seed_blob(&store, "tomcat", "0.4.1").await;

        let added = repo.batch_update("").await.unwrap();
        assert_eq!(added, vec![("tomcat".to_string(), "0.4.1".to_string())]);

        let index = live_index(&repo).await;
        assert!(index.by_chart_and_version("ark", "1.0.1").is_some());
        assert!(index.by_chart_and_version("tomcat", "0.4.1").is_some());
    }

    #[tokio::test]
    async fn test_delete_inverts_add() {
        let (repo, store) = repo_with_store();
        let key = seed_blob(&store, "ark", "1.0.1").await;
        repo.add(&[key.clone()]).await.unwrap();
        let before = String::from_utf8(repo.index_bytes().await.unwrap().unwrap()).unwrap();

        seed_blob(&store, "tomcat", "0.4.1").await;
        repo.add(&["tomcat-0.4.1.tgz".to_string()]).await.unwrap();
        repo.delete(&[DeleteTarget::Chart("tomcat".to_string())])
            .await
            .unwrap();
        let after = String::from_utf8(repo.index_bytes().await.unwrap().unwrap()).unwrap();

        // Byte-identical up to the generated timestamp
        let stable = |doc: &str| {
            doc.lines()
                .filter(|l| !l.starts_with("generated:"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(stable(&before), stable(&after));
    }
}

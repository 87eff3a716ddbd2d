//! Full-load index update for single-archive pushes.
//!
//! When the HTTP layer already holds the archive in memory there is no need
//! for the streaming rewriter: load the document, insert one record, dump it
//! back. Outcome-equivalent to a one-element streaming add.

use super::{Index, timestamp_now};
use crate::chart::ChartArchive;
use crate::error::RepoError;

/// Insert `archive`'s version record into the index bytes (or a fresh
/// skeleton when `current` is `None`).
///
/// Returns the dumped document, or `None` when the same version with the
/// same digest is already indexed and nothing needs writing. An indexed
/// version with a different digest fails with `AlreadyPresent`.
pub fn apply_archive(
    current: Option<&[u8]>,
    archive: &ChartArchive,
    base_url: &str,
) -> Result<Option<String>, RepoError> {
    let mut index = match current {
        Some(bytes) => Index::parse(bytes)?,
        None => Index::new(),
    };

    if let Some(existing) = index.by_chart_and_version(archive.name(), archive.version()) {
        if existing.digest == archive.digest() {
            return Ok(None);
        }
        return Err(RepoError::AlreadyPresent {
            name: archive.name().to_string(),
            version: archive.version().to_string(),
        });
    }

    let mut record = archive.version_record(base_url);
    record.created = Some(timestamp_now());
    index.push_record(archive.name(), record);

    index.dump().map(Some)
}

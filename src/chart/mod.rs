use flate2::read::GzDecoder;
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::io::Read;

use crate::error::RepoError;
use crate::index::VersionRecord;

/// A parsed Helm chart archive: the raw `.tgz` bytes plus the view derived
/// from its `Chart.yaml`.
///
/// Digest and filename are functions of the content alone; two archives with
/// identical bytes are indistinguishable.
#[derive(Debug)]
pub struct ChartArchive {
    bytes: Vec<u8>,
    manifest: Mapping,
    name: String,
    version: String,
    digest: String,
}

impl ChartArchive {
    /// Parse raw upload bytes into a chart archive.
    ///
    /// Streams the bytes through a gzip decoder and a tar reader, scanning for
    /// the first entry named `Chart.yaml` (normally `{name}/Chart.yaml` inside
    /// the versioned folder). Fails with `MalformedArchive` when the bytes are
    /// not gzip, not tar, carry no `Chart.yaml`, or the manifest is missing
    /// `name` or `version`.
    pub fn parse(bytes: Vec<u8>) -> Result<Self, RepoError> {
        let manifest = extract_manifest(&bytes)?;
        let name = manifest_string(&manifest, "name")?;
        let version = manifest_string(&manifest, "version")?;
        let digest = hex::encode(Sha256::digest(&bytes));

        Ok(Self {
            bytes,
            manifest,
            name,
            version,
            digest,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Hex SHA-256 of the raw archive bytes (not of the decompressed stream).
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The parsed `Chart.yaml` mapping, field order preserved.
    pub fn manifest(&self) -> &Mapping {
        &self.manifest
    }

    /// Canonical storage key and URL path fragment: `{name}-{version}.tgz`.
    pub fn filename(&self) -> String {
        chart_filename(&self.name, &self.version)
    }

    /// Build the index version record for this archive. `created` is left
    /// unset; the index layer stamps timestamps at write time.
    pub fn version_record(&self, base_url: &str) -> VersionRecord {
        VersionRecord {
            created: None,
            urls: vec![chart_url(base_url, &self.filename())],
            digest: self.digest.clone(),
            manifest: self.manifest.clone(),
        }
    }
}

/// `{name}-{version}.tgz`
pub fn chart_filename(name: &str, version: &str) -> String {
    format!("{}-{}.tgz", name, version)
}

/// Join the configured base URL with a chart filename.
pub fn chart_url(base_url: &str, filename: &str) -> String {
    if base_url.is_empty() || base_url.ends_with('/') {
        format!("{}{}", base_url, filename)
    } else {
        format!("{}/{}", base_url, filename)
    }
}

fn extract_manifest(bytes: &[u8]) -> Result<Mapping, RepoError> {
    let gz = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(gz);

    let entries = archive
        .entries()
        .map_err(|e| RepoError::MalformedArchive(format!("read archive entries: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| RepoError::MalformedArchive(format!("read archive entry: {}", e)))?;

        let is_chart_yaml = entry
            .path()
            .map_err(|e| RepoError::MalformedArchive(format!("read entry path: {}", e)))?
            .file_name()
            .is_some_and(|f| f == "Chart.yaml");
        if !is_chart_yaml {
            continue;
        }

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .map_err(|e| RepoError::MalformedArchive(format!("read Chart.yaml: {}", e)))?;

        return serde_yaml::from_str(&content)
            .map_err(|e| RepoError::MalformedArchive(format!("parse Chart.yaml: {}", e)));
    }

    Err(RepoError::MalformedArchive(
        "archive does not contain a Chart.yaml".to_string(),
    ))
}

fn manifest_string(manifest: &Mapping, key: &str) -> Result<String, RepoError> {
    match manifest.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(_) => Err(RepoError::MalformedArchive(format!(
            "Chart.yaml field {} is not a string",
            key
        ))),
        None => Err(RepoError::MalformedArchive(format!(
            "Chart.yaml is missing required field {}",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    /// Build a minimal `.tgz` archive containing `{name}/Chart.yaml` with the
    /// given manifest body.
    fn build_tgz(dir: &str, chart_yaml: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path(format!("{}/Chart.yaml", dir)).unwrap();
        header.set_size(chart_yaml.len() as u64);
        header.set_cksum();
        builder.append(&header, chart_yaml.as_bytes()).unwrap();
        let tar_data = builder.into_inner().unwrap();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_parse_roundtrip() {
        let manifest = "name: ark\nversion: 1.0.1\ndescription: A ship of a chart\nappVersion: \"2.1\"\n";
        let bytes = build_tgz("ark", manifest);
        let expected_digest = hex::encode(Sha256::digest(&bytes));

        let archive = ChartArchive::parse(bytes).unwrap();
        assert_eq!(archive.name(), "ark");
        assert_eq!(archive.version(), "1.0.1");
        assert_eq!(archive.digest(), expected_digest);
        assert_eq!(archive.filename(), "ark-1.0.1.tgz");
        assert_eq!(
            archive.manifest().get("description").unwrap(),
            &Value::String("A ship of a chart".into())
        );
    }

    #[test]
    fn test_version_record_urls() {
        let bytes = build_tgz("ark", "name: ark\nversion: 1.0.1\n");
        let archive = ChartArchive::parse(bytes).unwrap();

        let record = archive.version_record("http://charts.example.com/");
        assert_eq!(record.urls, vec!["http://charts.example.com/ark-1.0.1.tgz"]);
        assert_eq!(record.digest, archive.digest());
        assert!(record.created.is_none());
    }

    #[test]
    fn test_chart_url_joins_single_slash() {
        assert_eq!(
            chart_url("http://h/", "ark-1.0.1.tgz"),
            "http://h/ark-1.0.1.tgz"
        );
        assert_eq!(
            chart_url("http://h", "ark-1.0.1.tgz"),
            "http://h/ark-1.0.1.tgz"
        );
    }

    #[test]
    fn test_not_gzip_fails() {
        let err = ChartArchive::parse(b"plain text, not a tarball".to_vec()).unwrap_err();
        assert!(matches!(err, RepoError::MalformedArchive(_)));
    }

    #[test]
    fn test_gzip_but_not_tar_fails() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"gzipped garbage").unwrap();
        let bytes = encoder.finish().unwrap();

        let err = ChartArchive::parse(bytes).unwrap_err();
        assert!(matches!(err, RepoError::MalformedArchive(_)));
    }

    #[test]
    fn test_missing_chart_yaml_fails() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_path("ark/values.yaml").unwrap();
        header.set_size(3);
        header.set_cksum();
        builder.append(&header, &b"a: b"[..3]).unwrap();
        let tar_data = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_data).unwrap();
        let bytes = encoder.finish().unwrap();

        let err = ChartArchive::parse(bytes).unwrap_err();
        assert!(err.to_string().contains("Chart.yaml"));
    }

    #[test]
    fn test_missing_name_fails() {
        let bytes = build_tgz("ark", "version: 1.0.1\n");
        let err = ChartArchive::parse(bytes).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_missing_version_fails() {
        let bytes = build_tgz("ark", "name: ark\n");
        let err = ChartArchive::parse(bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_non_string_version_fails() {
        let bytes = build_tgz("ark", "name: ark\nversion: [1, 0, 1]\n");
        let err = ChartArchive::parse(bytes).unwrap_err();
        assert!(err.to_string().contains("not a string"));
    }

    #[test]
    fn test_first_chart_yaml_wins() {
        // A chart with a bundled subchart: the top-level manifest comes first
        let top = "name: ark\nversion: 1.0.1\n";
        let sub = "name: dependency\nversion: 9.9.9\n";

        let mut builder = tar::Builder::new(Vec::new());
        for (path, body) in [("ark/Chart.yaml", top), ("ark/charts/dep/Chart.yaml", sub)] {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(body.len() as u64);
            header.set_cksum();
            builder.append(&header, body.as_bytes()).unwrap();
        }
        let tar_data = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_data).unwrap();
        let bytes = encoder.finish().unwrap();

        let archive = ChartArchive::parse(bytes).unwrap();
        assert_eq!(archive.name(), "ark");
        assert_eq!(archive.version(), "1.0.1");
    }
}

pub mod rewrite;
pub mod update;

use chrono::Local;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::RepoError;

/// Storage key of the live index document.
pub const INDEX_KEY: &str = "index.yaml";
/// Staging key the orchestrator renames onto `INDEX_KEY` to commit a rewrite.
pub const INDEX_STAGE_KEY: &str = "index.yaml.stage";
/// Index schema version understood by Helm clients.
pub const API_VERSION: &str = "v1";
/// Skeleton written when the index is created lazily on first write.
pub const EMPTY_INDEX: &str = "apiVersion: v1\nentries:\n";

/// Timestamp in Helm's own format: nanosecond precision, explicit offset.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.9f%:z").to_string()
}

fn yaml_data_error(e: serde_yaml::Error) -> RepoError {
    RepoError::Store(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// One entry within `entries[name]` describing a single uploaded version.
///
/// Serialized field order is `created`, `urls`, `digest`, then every manifest
/// field in manifest order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub digest: String,
    /// The chart's `Chart.yaml` fields, copied verbatim (`name`, `version`,
    /// `description`, ...).
    #[serde(flatten)]
    pub manifest: Mapping,
}

impl VersionRecord {
    fn manifest_str(&self, key: &str) -> Option<&str> {
        match self.manifest.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.manifest_str("name")
    }

    pub fn version(&self) -> Option<&str> {
        self.manifest_str("version")
    }
}

/// Typed view over a parsed `index.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Index {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    /// Chart name to version records; both name order and version order are
    /// preserved as encountered.
    #[serde(deserialize_with = "entries_or_empty")]
    pub entries: IndexMap<String, Vec<VersionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<String>,
}

/// `entries:` with no value (the lazily-created skeleton) parses as null.
fn entries_or_empty<'de, D>(
    deserializer: D,
) -> Result<IndexMap<String, Vec<VersionRecord>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<IndexMap<String, Vec<VersionRecord>>> =
        Option::deserialize(deserializer)?;
    Ok(entries.unwrap_or_default())
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn new() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            entries: IndexMap::new(),
            generated: None,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, RepoError> {
        serde_yaml::from_slice(bytes).map_err(yaml_data_error)
    }

    pub fn entries(&self) -> &IndexMap<String, Vec<VersionRecord>> {
        &self.entries
    }

    pub fn entries_by_chart(&self, name: &str) -> Option<&[VersionRecord]> {
        self.entries.get(name).map(|v| v.as_slice())
    }

    pub fn by_chart_and_version(&self, name: &str, version: &str) -> Option<&VersionRecord> {
        self.entries
            .get(name)?
            .iter()
            .find(|r| r.version() == Some(version))
    }

    /// Register a chart under a new name. No-op when the name already exists.
    pub fn add_new_chart(&mut self, name: &str, versions: Vec<VersionRecord>) {
        if !self.entries.contains_key(name) {
            self.entries.insert(name.to_string(), versions);
        }
    }

    /// Append a record to a chart, creating the chart entry when absent.
    pub fn push_record(&mut self, name: &str, record: VersionRecord) {
        match self.entries.get_mut(name) {
            Some(versions) => versions.push(record),
            None => self.add_new_chart(name, vec![record]),
        }
    }

    /// Serialize as block-style YAML, restamping `generated`.
    pub fn dump(&mut self) -> Result<String, RepoError> {
        self.generated = Some(timestamp_now());
        serde_yaml::to_string(self).map_err(yaml_data_error)
    }

    /// Like `dump`, but yields nothing when there are no entries, for
    /// consumers that prefer absence to an empty skeleton.
    pub fn dump_if_nonempty(&mut self) -> Result<Option<String>, RepoError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        self.dump().map(Some)
    }
}

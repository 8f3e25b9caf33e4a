//! Deployment record written after setup so tooling can find live object ids.

use crate::config::{Network, DEFAULT_MODULE};
use crate::error::{StashError, StashResult};
use crate::types::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default file name next to the working directory.
pub const DEFAULT_DEPLOYMENT_FILE: &str = "deployment.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothRecord {
    pub name: String,
    pub id: ObjectId,
}

/// Key/value document describing one deployed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct DeploymentRecord {
    pub network: Network,
    pub package_id: ObjectId,
    #[serde(default = "default_module")]
    pub module: String,
    /// TicketMachine of the demo event.
    #[serde(default)]
    pub test_event_id: Option<ObjectId>,
    #[serde(default)]
    pub organizer_cap_id: Option<ObjectId>,
    #[serde(default)]
    pub reward_config_id: Option<ObjectId>,
    #[serde(default)]
    pub treasury_id: Option<ObjectId>,
    #[serde(default)]
    pub demo_booth_id: Option<ObjectId>,
    #[serde(default)]
    pub booths: Vec<BoothRecord>,
    pub updated_at: DateTime<Utc>,
}

fn default_module() -> String {
    DEFAULT_MODULE.to_string()
}

impl DeploymentRecord {
    pub fn new(network: Network, package_id: ObjectId) -> Self {
        Self {
            network,
            package_id,
            module: default_module(),
            test_event_id: None,
            organizer_cap_id: None,
            reward_config_id: None,
            treasury_id: None,
            demo_booth_id: None,
            booths: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Record a booth; the first one becomes the demo booth.
    pub fn add_booth(&mut self, name: impl Into<String>, id: ObjectId) {
        if self.demo_booth_id.is_none() {
            self.demo_booth_id = Some(id);
        }
        self.booths.push(BoothRecord {
            name: name.into(),
            id,
        });
    }

    pub fn booth_named(&self, name: &str) -> Option<ObjectId> {
        self.booths
            .iter()
            .find(|booth| booth.name.eq_ignore_ascii_case(name))
            .map(|booth| booth.id)
    }

    pub fn load(path: &Path) -> StashResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            StashError::Serialization(format!("{}: {e}", path.display()))
        })
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_optional(path: &Path) -> StashResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Atomic write: serialize to a sibling `.tmp` file, then rename over `path`.
    pub fn save(&mut self, path: &Path) -> StashResult<()> {
        self.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_DEPLOYMENT_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record() -> DeploymentRecord {
        let mut record = DeploymentRecord::new(Network::Testnet, "0xd847".parse().unwrap());
        record.test_event_id = Some("0xa1".parse().unwrap());
        record.add_booth("Main Gate", "0xb1".parse().unwrap());
        record.add_booth("VIP Gate", "0xb2".parse().unwrap());
        record
    }

    #[test]
    fn save_then_load_preserves_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deployment.json");
        let mut original = record();
        original.save(&path).unwrap();

        let loaded = DeploymentRecord::load(&path).unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.demo_booth_id, Some("0xb1".parse().unwrap()));
        assert_eq!(loaded.booth_named("vip gate"), Some("0xb2".parse().unwrap()));
        assert!(!path.with_file_name("deployment.json.tmp").exists());
    }

    #[test]
    fn uses_upper_case_keys() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["NETWORK"], "testnet");
        assert!(json["PACKAGE_ID"].as_str().unwrap().starts_with("0x"));
        assert_eq!(json["MODULE"], "event_manager");
        assert_eq!(json["BOOTHS"][1]["name"], "VIP Gate");
        assert!(json.get("UPDATED_AT").is_some());
    }

    #[test]
    fn missing_file_is_none_and_garbage_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deployment.json");
        assert!(DeploymentRecord::load_optional(&path).unwrap().is_none());
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            DeploymentRecord::load(&path),
            Err(StashError::Serialization(_))
        ));
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Requirement, Version};
use log::warn;

/// The `info.json` manifest shipped inside every mod.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModInfo {
    pub name: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factorio_version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Fields we do not model, kept so `make-compatible` can rewrite the file.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModInfo {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Failed to parse info.json")
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize info.json")
    }

    /// The game major.minor this mod targets.
    ///
    /// Falls back to the oldest supported game version when the field is
    /// absent or unparseable.
    pub fn game_version(&self) -> Version {
        self.factorio_version
            .as_deref()
            .and_then(|v| v.parse::<Version>().ok())
            .map(|v| v.major_minor())
            .unwrap_or_else(Version::default_game_version)
    }

    /// Parsed dependency requirements. Malformed entries are skipped.
    pub fn requirements(&self) -> Vec<Requirement> {
        parse_dependencies(&self.name, &self.dependencies)
    }
}

pub(crate) fn parse_dependencies(owner: &str, dependencies: &[String]) -> Vec<Requirement> {
    dependencies
        .iter()
        .filter_map(|dep| match dep.parse::<Requirement>() {
            Ok(req) => Some(req),
            Err(e) => {
                warn!("Ignoring dependency {:?} of {}: {}", dep, owner, e);
                None
            }
        })
        .collect()
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

pub const MOD_LIST_FILE: &str = "mod-list.json";

/// Game versions before this one store `enabled` as the strings "true"/"false".
const BOOLEAN_FLAG_SINCE: [u64; 2] = [0, 15];

/// The `enabled` flag as stored on disk.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum EnabledFlag {
    Bool(bool),
    Text(String),
}

impl EnabledFlag {
    pub fn is_enabled(&self) -> bool {
        match self {
            EnabledFlag::Bool(b) => *b,
            EnabledFlag::Text(s) => s != "false",
        }
    }

    fn new(enabled: bool, legacy: bool) -> Self {
        if legacy {
            EnabledFlag::Text(enabled.to_string())
        } else {
            EnabledFlag::Bool(enabled)
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModListEntry {
    pub name: String,
    pub enabled: EnabledFlag,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Enable/disable state shared with the game through `mod-list.json`.
///
/// Every mutation is a whole-file read-modify-write; concurrent writers are
/// not coordinated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ModList {
    #[serde(default)]
    pub mods: Vec<ModListEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ModList {
    pub fn path(mods_dir: &Path) -> PathBuf {
        mods_dir.join(MOD_LIST_FILE)
    }

    /// Load the list from `mods_dir`. A missing file is an empty list.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, mods_dir: &Path) -> Result<Self> {
        let path = Self::path(mods_dir);
        if !runtime.exists(&path) {
            return Ok(ModList::default());
        }
        let content = runtime.read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, mods_dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        runtime.write(&Self::path(mods_dir), json.as_bytes())
    }

    /// Mods without an entry are enabled by the game.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.mods
            .iter()
            .find(|m| m.name == name)
            .is_none_or(|m| m.enabled.is_enabled())
    }

    /// Set the flag for `name`, adding an entry if needed. Returns whether
    /// the effective state changed.
    pub fn set_enabled(&mut self, name: &str, enabled: bool, legacy: bool) -> bool {
        let changed = self.is_enabled(name) != enabled;
        let flag = EnabledFlag::new(enabled, legacy);
        match self.mods.iter_mut().find(|m| m.name == name) {
            Some(entry) => {
                if changed {
                    entry.enabled = flag;
                }
            }
            None => self.mods.push(ModListEntry {
                name: name.to_string(),
                enabled: flag,
                extra: BTreeMap::new(),
            }),
        }
        changed
    }

    /// Whether `game_version` expects string flags.
    pub fn uses_legacy_flags(game_version: &crate::package::Version) -> bool {
        let segments = game_version.segments();
        let major = segments.first().copied().unwrap_or(0);
        let minor = segments.get(1).copied().unwrap_or(0);
        [major, minor] < BOOLEAN_FLAG_SINCE
    }
}

/// Load, update and save in one step. Returns whether the state changed.
pub fn set_mod_enabled<R: Runtime>(
    runtime: &R,
    mods_dir: &Path,
    name: &str,
    enabled: bool,
    legacy: bool,
) -> Result<bool> {
    let mut list = ModList::load(runtime, mods_dir)?;
    let changed = list.set_enabled(name, enabled, legacy);
    if changed {
        list.save(runtime, mods_dir)?;
    }
    Ok(changed)
}

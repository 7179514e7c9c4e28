//! The remote mod catalog.
//!
//! The resolver and the install flow only see [`ModCatalog`]; [`ModPortal`]
//! implements it against the Factorio mod portal.

mod portal;
mod types;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

use crate::package::{Requirement, Version, parse_dependencies};

pub use portal::{DEFAULT_API_URL, DEFAULT_AUTH_URL, ModPortal};

/// One published version of a mod.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub version: Version,
    /// The single game major.minor this release targets.
    pub game_version: Version,
    pub file_name: String,
    /// Size announced by the catalog, when it provides one.
    pub file_size: Option<u64>,
    /// Absolute URL of the release file.
    pub download_url: String,
    /// Raw requirement strings from the release's `info.json`.
    pub dependencies: Vec<String>,
    pub released_at: Option<String>,
}

impl Release {
    pub fn requirements(&self, owner: &str) -> Vec<Requirement> {
        parse_dependencies(owner, &self.dependencies)
    }
}

/// A mod as described by the catalog, releases in catalog order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mod {
    pub name: String,
    pub owner: String,
    pub title: String,
    pub summary: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub github_path: Option<String>,
    pub license: Option<String>,
    pub tags: Vec<String>,
    pub downloads_count: u64,
    pub releases: Vec<Release>,
}

impl Mod {
    /// Distinct game versions across all releases, in first-seen order.
    pub fn game_versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = Vec::new();
        for release in &self.releases {
            if !versions.contains(&release.game_version) {
                versions.push(release.game_version.clone());
            }
        }
        versions
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModSummary {
    pub name: String,
    pub owner: String,
    pub title: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub downloads_count: u64,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most downloaded first
    #[default]
    Top,
    /// By name, case-insensitive
    Alpha,
    /// Most recently updated first
    Updated,
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(SortOrder::Top),
            "alpha" => Ok(SortOrder::Alpha),
            "updated" => Ok(SortOrder::Updated),
            other => anyhow::bail!("Unknown sort order: {}", other),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Top => "top",
            SortOrder::Alpha => "alpha",
            SortOrder::Updated => "updated",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchFilters {
    /// Only mods carrying every one of these tags.
    pub tags: Vec<String>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModCatalog: Send + Sync {
    /// Fetch a mod with all of its releases. Unknown names fail with
    /// `Error::ModNotFound`.
    async fn get_mod(&self, name: &str) -> Result<Mod>;

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<ModSummary>>;

    /// Exchange a username and password for a download token.
    ///
    /// Rejections fail with `Error::Auth`, or `Error::Ownership` when the
    /// account does not own the game.
    async fn login(&self, username: &str, password: &str, require_ownership: bool)
    -> Result<String>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A release targeting `game` with the given dependency strings.
    pub fn release(name: &str, version: &str, game: &str, deps: &[&str]) -> Release {
        Release {
            version: version.parse().unwrap(),
            game_version: game.parse().unwrap(),
            file_name: format!("{}_{}.zip", name, version),
            file_size: Some(1000),
            download_url: format!("https://mods.example.org/download/{}/{}", name, version),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            released_at: None,
        }
    }

    pub fn remote_mod(name: &str, releases: Vec<Release>) -> Mod {
        Mod {
            name: name.to_string(),
            owner: "someone".to_string(),
            title: name.to_string(),
            releases,
            ..Default::default()
        }
    }
}

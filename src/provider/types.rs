//! Wire records of the mod portal API.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

use super::{Mod, ModSummary, Release};
use crate::package::Version;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PortalModList {
    #[serde(default)]
    pub results: Vec<PortalMod>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PortalMod {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub github_path: Option<String>,
    pub license: Option<PortalLicense>,
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<PortalTag>,
    #[serde(default)]
    pub downloads_count: u64,
    pub updated_at: Option<String>,
    #[serde(default)]
    pub releases: Vec<PortalRelease>,
    pub latest_release: Option<PortalRelease>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PortalLicense {
    pub name: Option<String>,
    pub title: Option<String>,
}

/// Tags are plain strings in current responses and `{name}` objects in older ones.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum PortalTag {
    Name(String),
    Object { name: String },
}

impl PortalTag {
    fn into_name(self) -> String {
        match self {
            PortalTag::Name(name) | PortalTag::Object { name } => name,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PortalRelease {
    pub version: String,
    pub download_url: String,
    pub file_name: String,
    pub file_size: Option<u64>,
    pub factorio_version: Option<String>,
    pub game_version: Option<String>,
    pub info_json: Option<PortalInfoJson>,
    pub released_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PortalInfoJson {
    pub factorio_version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PortalRelease {
    /// Convert to a [`Release`], resolving `download_url` against `base`.
    pub fn into_release(self, base: &Url) -> Result<Release> {
        let version: Version = self
            .version
            .parse()
            .with_context(|| format!("Invalid release version {:?}", self.version))?;

        let declared = self
            .info_json
            .as_ref()
            .and_then(|info| info.factorio_version.clone())
            .or(self.factorio_version)
            .or(self.game_version);
        let game_version = match declared {
            Some(v) => v
                .parse::<Version>()
                .with_context(|| format!("Invalid game version {:?}", v))?
                .major_minor(),
            None => Version::default_game_version(),
        };

        let download_url = base
            .join(&self.download_url)
            .with_context(|| format!("Invalid download URL {:?}", self.download_url))?
            .to_string();

        Ok(Release {
            version,
            game_version,
            file_name: self.file_name,
            file_size: self.file_size,
            download_url,
            dependencies: self.info_json.map(|i| i.dependencies).unwrap_or_default(),
            released_at: self.released_at,
        })
    }
}

impl PortalMod {
    fn tag_names(tags: Vec<PortalTag>, category: Option<String>) -> Vec<String> {
        let mut names: Vec<String> = tags.into_iter().map(PortalTag::into_name).collect();
        if let Some(category) = category
            && !category.is_empty()
            && !names.contains(&category)
        {
            names.insert(0, category);
        }
        names
    }

    /// Convert to a [`Mod`]. Releases that do not parse are dropped and
    /// returned as errors alongside the mod.
    pub fn into_mod(self, base: &Url) -> (Mod, Vec<anyhow::Error>) {
        let mut errors = Vec::new();
        let releases = self
            .releases
            .into_iter()
            .filter_map(|r| {
                r.into_release(base)
                    .map_err(|e| errors.push(e))
                    .ok()
            })
            .collect();

        let license = self
            .license
            .and_then(|l| l.title.or(l.name));

        let m = Mod {
            name: self.name,
            owner: self.owner,
            title: self.title,
            summary: self.summary,
            description: self.description,
            homepage: self.homepage.filter(|h| !h.is_empty()),
            github_path: self.github_path.filter(|g| !g.is_empty()),
            license,
            tags: Self::tag_names(self.tags, self.category),
            downloads_count: self.downloads_count,
            releases,
        };
        (m, errors)
    }
}

impl From<PortalMod> for ModSummary {
    fn from(m: PortalMod) -> Self {
        ModSummary {
            name: m.name,
            owner: m.owner,
            title: m.title,
            summary: m.summary,
            tags: PortalMod::tag_names(m.tags, m.category),
            downloads_count: m.downloads_count,
            updated_at: m
                .updated_at
                .or_else(|| m.latest_release.and_then(|r| r.released_at)),
        }
    }
}

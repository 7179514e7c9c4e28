//! Persisted settings and the resolved per-invocation context.

use anyhow::{Context as _, Result, anyhow, bail};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::package::{ModInfo, Version};
use crate::resolver::ResolveOptions;
use crate::runtime::Runtime;
use crate::store::ModStore;

pub const CONFIG_DIR: &str = "fac";
pub const CONFIG_FILE: &str = "config.json";

/// Settings saved between runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Mods excluded from updates.
    pub hold: Vec<String>,
    /// Game data directory, the one holding `base/info.json`.
    pub data_path: Option<PathBuf>,
    /// Directory holding `config/` and `mods/`.
    pub write_path: Option<PathBuf>,
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    /// `<config_dir>/fac/config.json`
    pub fn default_path<R: Runtime>(runtime: &R) -> Result<PathBuf> {
        let dir = runtime
            .config_dir()
            .ok_or_else(|| anyhow!("Could not determine the configuration directory"))?;
        Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let mut config = if runtime.exists(path) {
            let text = runtime.read_to_string(path)?;
            serde_json::from_str::<Config>(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Config::default()
        };
        config.path = path.to_path_buf();
        Ok(config)
    }

    pub fn save<R: Runtime>(&self, runtime: &R) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            runtime.create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        runtime
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("Failed to save {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.hold.iter().any(|h| h == name)
    }

    /// Add `name` to the hold list. Returns false if it was already held.
    pub fn hold(&mut self, name: &str) -> bool {
        if self.is_held(name) {
            return false;
        }
        self.hold.push(name.to_string());
        true
    }

    /// Remove `name` from the hold list. Returns false if it was not held.
    pub fn unhold(&mut self, name: &str) -> bool {
        let before = self.hold.len();
        self.hold.retain(|h| h != name);
        self.hold.len() != before
    }

    /// The configured data path, or the first search location that is one.
    pub fn data_path<R: Runtime>(&self, runtime: &R) -> Result<PathBuf> {
        if let Some(path) = &self.data_path {
            if is_data_path(runtime, path) {
                return Ok(path.clone());
            }
            bail!(
                "The data path {} does not seem to be correct.\n\
                 Please check data_path in {} and make sure it points to a \
                 directory containing a base/info.json file.",
                path.display(),
                self.path.display()
            );
        }

        for path in search_paths(runtime) {
            if is_data_path(runtime, &path) {
                return Ok(path);
            }
            let data = path.join("data");
            if is_data_path(runtime, &data) {
                return Ok(data);
            }
        }
        bail!(
            "Can not find the factorio data path.\nPlease set data_path in {}",
            self.path.display()
        )
    }

    /// The configured write path, or the first search location that is one.
    pub fn write_path<R: Runtime>(&self, runtime: &R) -> Result<PathBuf> {
        if let Some(path) = &self.write_path {
            if is_write_path(runtime, path) {
                return Ok(path.clone());
            }
            bail!(
                "The write path {} does not seem to be correct.\n\
                 Please check write_path in {} and make sure it points to a \
                 directory containing writable 'config' and 'mods' subdirectories.",
                path.display(),
                self.path.display()
            );
        }

        search_paths(runtime)
            .into_iter()
            .find(|path| is_write_path(runtime, path))
            .ok_or_else(|| {
                anyhow!(
                    "Can not find a valid factorio write path.\nPlease set write_path in {}",
                    self.path.display()
                )
            })
    }
}

pub fn is_data_path<R: Runtime>(runtime: &R, path: &Path) -> bool {
    runtime.exists(&path.join("base").join("info.json"))
}

pub fn is_write_path<R: Runtime>(runtime: &R, path: &Path) -> bool {
    runtime.is_writable_dir(&path.join("config")) && runtime.is_writable_dir(&path.join("mods"))
}

/// Places a game installation is commonly found, most specific first.
pub fn search_paths<R: Runtime>(runtime: &R) -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("."),
        PathBuf::from("factorio"),
        PathBuf::from(".."),
        Path::new("..").join("factorio"),
    ];

    if let Some(data) = runtime.data_dir() {
        paths.push(data.join("factorio"));
        paths.push(data.join("Factorio"));
        let steam = data.join("Steam");
        paths.push(steam.join("SteamApps").join("common").join("Factorio"));
        paths.push(steam.join("steamapps").join("common").join("Factorio"));
        paths.push(
            steam
                .join("steamapps")
                .join("common")
                .join("Factorio")
                .join("factorio.app")
                .join("Contents"),
        );
    }

    if cfg!(windows) {
        if let Ok(appdata) = runtime.env_var("APPDATA") {
            paths.push(Path::new(&appdata).join("factorio"));
        }
        paths.push(PathBuf::from(
            r"C:\Program Files (x86)\Steam\SteamApps\common\factorio",
        ));
    } else {
        if let Some(home) = runtime.home_dir() {
            paths.push(home.join("factorio"));
            if cfg!(target_os = "linux") {
                paths.push(home.join(".factorio"));
            }
        }
        if cfg!(target_os = "linux") {
            paths.push(PathBuf::from("/usr/share/factorio"));
        } else {
            paths.push(PathBuf::from("/Applications/factorio.app/Contents"));
        }
    }

    paths
}

/// Command-line settings that take precedence over discovery.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub game_version: Option<String>,
    pub mods_dir: Option<PathBuf>,
    pub ignore_game_version: bool,
}

/// Everything the store, resolver and installer need to know about the
/// game installation for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub game_version: Version,
    pub mods_dir: PathBuf,
    /// Holds the temporary download area and `player-data.json`.
    pub write_path: PathBuf,
    pub hold: BTreeSet<String>,
    pub ignore_game_version: bool,
}

impl Context {
    #[tracing::instrument(skip(runtime, config))]
    pub fn resolve<R: Runtime>(runtime: &R, config: &Config, overrides: &Overrides) -> Result<Self> {
        let game_version = match &overrides.game_version {
            Some(forced) => forced
                .parse::<Version>()
                .with_context(|| format!("Invalid game version {:?}", forced))?,
            None => {
                let data_path = config.data_path(runtime)?;
                debug!("Factorio data path: {}", data_path.display());
                read_game_version(runtime, &data_path)?
            }
        };

        let write_path = config.write_path(runtime)?;
        let mods_dir = overrides
            .mods_dir
            .clone()
            .unwrap_or_else(|| write_path.join("mods"));

        debug!("Factorio write path: {}", write_path.display());
        debug!("Factorio version: {}", game_version);
        debug!("Mods directory: {}", mods_dir.display());

        Ok(Self {
            game_version,
            mods_dir,
            write_path,
            hold: config.hold.iter().cloned().collect(),
            ignore_game_version: overrides.ignore_game_version,
        })
    }

    pub fn store<R: Runtime>(&self, runtime: Arc<R>) -> ModStore<R> {
        ModStore::new(
            runtime,
            self.mods_dir.clone(),
            self.game_version.clone(),
            self.hold.clone(),
        )
    }

    pub fn resolve_options(&self, held: bool, reinstall: bool, downgrade: bool) -> ResolveOptions {
        ResolveOptions {
            held,
            reinstall,
            downgrade,
            ignore_game_version: self.ignore_game_version,
        }
    }
}

/// The `version` field of `<data_path>/base/info.json`.
pub fn read_game_version<R: Runtime>(runtime: &R, data_path: &Path) -> Result<Version> {
    let path = data_path.join("base").join("info.json");
    let text = runtime.read_to_string(&path)?;
    let info = ModInfo::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(info.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn game_dir(root: &Path, version: &str) {
        std::fs::create_dir_all(root.join("data/base")).unwrap();
        std::fs::write(
            root.join("data/base/info.json"),
            format!(r#"{{"name": "base", "version": "{}"}}"#, version),
        )
        .unwrap();
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::create_dir_all(root.join("mods")).unwrap();
    }

    #[test]
    fn test_default_path() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_config_dir()
            .returning(|| Some(PathBuf::from("/home/user/.config")));
        assert_eq!(
            Config::default_path(&runtime).unwrap(),
            PathBuf::from("/home/user/.config/fac/config.json")
        );
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let mut runtime = MockRuntime::new();
        let path = PathBuf::from("/home/user/.config/fac/config.json");
        runtime
            .expect_exists()
            .with(eq(path.clone()))
            .returning(|_| false);

        let config = Config::load(&runtime, &path).unwrap();
        assert!(config.hold.is_empty());
        assert_eq!(config.data_path, None);
        assert_eq!(config.path(), path.as_path());
    }

    #[test]
    fn test_hold_and_unhold_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fac").join(CONFIG_FILE);

        let mut config = Config::load(&RealRuntime, &path).unwrap();
        assert!(config.hold("foo"));
        assert!(!config.hold("foo"));
        assert!(config.hold("bar"));
        config.save(&RealRuntime).unwrap();

        let mut reloaded = Config::load(&RealRuntime, &path).unwrap();
        assert_eq!(reloaded.hold, vec!["foo", "bar"]);
        assert!(reloaded.unhold("foo"));
        assert!(!reloaded.unhold("foo"));
        assert_eq!(reloaded.hold, vec!["bar"]);
    }

    #[test]
    fn test_invalid_configured_paths_are_errors() {
        let dir = tempdir().unwrap();
        let config = Config {
            data_path: Some(dir.path().join("nope")),
            write_path: Some(dir.path().join("nope")),
            ..Default::default()
        };
        let err = config.data_path(&RealRuntime).unwrap_err();
        assert!(err.to_string().contains("does not seem to be correct"));
        assert!(config.write_path(&RealRuntime).is_err());
    }

    #[test]
    fn test_context_from_configured_paths() {
        let dir = tempdir().unwrap();
        game_dir(dir.path(), "0.17.79");
        let config = Config {
            hold: vec!["foo".into()],
            data_path: Some(dir.path().join("data")),
            write_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let context = Context::resolve(&RealRuntime, &config, &Overrides::default()).unwrap();
        assert_eq!(context.game_version.to_string(), "0.17.79");
        assert_eq!(context.mods_dir, dir.path().join("mods"));
        assert_eq!(context.write_path, dir.path());
        assert!(context.hold.contains("foo"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let dir = tempdir().unwrap();
        game_dir(dir.path(), "0.17.79");
        let elsewhere = dir.path().join("elsewhere");
        let config = Config {
            data_path: Some(dir.path().join("missing")),
            write_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let overrides = Overrides {
            game_version: Some("0.16.51".into()),
            mods_dir: Some(elsewhere.clone()),
            ignore_game_version: true,
        };

        let context = Context::resolve(&RealRuntime, &config, &overrides).unwrap();
        assert_eq!(context.game_version.to_string(), "0.16.51");
        assert_eq!(context.mods_dir, elsewhere);
        assert_eq!(context.write_path, dir.path());
        assert!(context.resolve_options(false, false, false).ignore_game_version);
    }

    #[test]
    fn test_invalid_forced_game_version() {
        let dir = tempdir().unwrap();
        game_dir(dir.path(), "0.17.79");
        let config = Config {
            write_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let overrides = Overrides {
            game_version: Some("not a version".into()),
            ..Default::default()
        };
        assert!(Context::resolve(&RealRuntime, &config, &overrides).is_err());
    }
}

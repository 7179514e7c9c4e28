//! The local mods directory.
//!
//! Every query rescans the directory: an [`InstalledMod`] is a snapshot and
//! goes stale as soon as anything installs, removes, packs or unpacks.

mod installed;

use anyhow::{Context, Result};
use glob::Pattern;
use log::{debug, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::archive::INFO_FILE;
use crate::error::Error;
use crate::package::{ModList, Requirement, Version, set_mod_enabled};
use crate::provider::{ModCatalog, SearchFilters};
use crate::runtime::Runtime;

pub use installed::{InstalledMod, ModArtifact, ModState, PackedMod, UnpackedMod};

/// Catalog hits shown when a remote search is ambiguous.
const SUGGESTION_LIMIT: usize = 5;

pub struct ModStore<R: Runtime> {
    runtime: Arc<R>,
    mods_dir: PathBuf,
    game_version: Version,
    hold: BTreeSet<String>,
}

impl<R: Runtime> ModStore<R> {
    pub fn new(
        runtime: Arc<R>,
        mods_dir: PathBuf,
        game_version: Version,
        hold: BTreeSet<String>,
    ) -> Self {
        Self {
            runtime,
            mods_dir,
            game_version,
            hold,
        }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    pub fn game_version(&self) -> &Version {
        &self.game_version
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.hold.contains(name)
    }

    /// Every readable mod in the directory, sorted by name then version.
    #[tracing::instrument(skip(self))]
    pub fn scan(&self) -> Result<Vec<InstalledMod>> {
        if !self.runtime.exists(&self.mods_dir) {
            debug!("Mods directory {:?} does not exist", self.mods_dir);
            return Ok(Vec::new());
        }

        let mod_list = ModList::load(self.runtime.as_ref(), &self.mods_dir)?;
        let mut mods = Vec::new();

        for path in self.runtime.read_dir(&self.mods_dir)? {
            let loaded = if self.runtime.is_dir(&path) {
                if !self.runtime.exists(&path.join(INFO_FILE)) {
                    debug!("Skipping {:?}: no {}", path, INFO_FILE);
                    continue;
                }
                UnpackedMod::load(self.runtime.as_ref(), &path, ModState::default())
                    .map(InstalledMod::Unpacked)
            } else if path.extension().is_some_and(|ext| ext == "zip") {
                PackedMod::load(self.runtime.as_ref(), &path, ModState::default())
                    .map(InstalledMod::Packed)
            } else {
                continue;
            };

            match loaded {
                Ok(mut m) => {
                    let state = ModState {
                        enabled: mod_list.is_enabled(m.name()),
                        held: self.is_held(m.name()),
                    };
                    match &mut m {
                        InstalledMod::Packed(p) => p.state = state,
                        InstalledMod::Unpacked(u) => u.state = state,
                    }
                    mods.push(m);
                }
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }

        mods.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.version().cmp(b.version()))
        });
        Ok(mods)
    }

    /// Installed mods whose name matches the shell-style `pattern`
    /// (case-sensitive), optionally restricted to one version and one
    /// representation.
    pub fn find(
        &self,
        pattern: Option<&str>,
        version: Option<&Version>,
        packed: Option<bool>,
    ) -> Result<Vec<InstalledMod>> {
        let pattern = pattern
            .map(Pattern::new)
            .transpose()
            .context("Invalid mod name pattern")?;

        Ok(self
            .scan()?
            .into_iter()
            .filter(|m| pattern.as_ref().is_none_or(|p| p.matches(m.name())))
            .filter(|m| version.is_none_or(|v| m.version() == v))
            .filter(|m| packed.is_none_or(|p| m.is_packed() == p))
            .collect())
    }

    /// The installed mod called exactly `name`, highest version first if
    /// several copies are present.
    pub fn get(&self, name: &str) -> Result<Option<InstalledMod>> {
        Ok(self
            .scan()?
            .into_iter()
            .filter(|m| m.name() == name)
            .max_by(|a, b| a.version().cmp(b.version())))
    }

    /// Distinct names of installed mods.
    pub fn names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|m| m.name().to_string())
            .collect())
    }

    /// Turn user input into the exact name of a mod.
    ///
    /// Tries, in order: exact local name, exact catalog name, case-insensitive
    /// local name, unique case-insensitive substring of a local name, and a
    /// catalog search with a single hit. The catalog is only consulted when
    /// one is given. Input containing `*` is a pattern and is returned as is.
    #[tracing::instrument(skip(self, catalog))]
    pub async fn resolve_name<C: ModCatalog + ?Sized>(
        &self,
        input: &str,
        catalog: Option<&C>,
    ) -> Result<String> {
        if input.contains('*') {
            return Ok(input.to_string());
        }

        let local = self.names()?;
        if local.contains(input) {
            return Ok(input.to_string());
        }

        if let Some(catalog) = catalog {
            match catalog.get_mod(input).await {
                Ok(m) => return Ok(m.name),
                Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => {}
                Err(e) => return Err(e),
            }
        }

        let lowered = input.to_lowercase();
        if let Some(name) = local.iter().find(|n| n.to_lowercase() == lowered) {
            return Ok(name.clone());
        }

        let partial: Vec<&String> = local
            .iter()
            .filter(|n| n.to_lowercase().contains(&lowered))
            .collect();
        if let [single] = partial.as_slice() {
            return Ok((*single).clone());
        }

        if let Some(catalog) = catalog {
            let filters = SearchFilters {
                limit: Some(SUGGESTION_LIMIT),
                ..Default::default()
            };
            let hits = catalog.search(input, &filters).await?;
            match hits.as_slice() {
                [single] => return Ok(single.name.clone()),
                [] => {}
                many => {
                    let names: Vec<&str> = many.iter().map(|m| m.name.as_str()).collect();
                    warn!("'{}' not found, try one of: {}", input, names.join(", "));
                }
            }
        }

        Err(Error::ModNotFound(input.to_string()).into())
    }

    /// Set the enabled flag in `mod-list.json`. Returns whether it changed.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        set_mod_enabled(
            self.runtime.as_ref(),
            &self.mods_dir,
            name,
            enabled,
            ModList::uses_legacy_flags(&self.game_version),
        )
    }
}

/// Whether one of `mods` satisfies `req` for `game_version` (major.minor).
pub fn satisfied_by(
    mods: &[InstalledMod],
    req: &Requirement,
    game_version: &Version,
    ignore_game_version: bool,
) -> bool {
    let game_version = game_version.major_minor();
    mods.iter().any(|m| {
        m.name() == req.bare_name()
            && req.matches(m.version())
            && (ignore_game_version || m.game_version() == game_version)
    })
}

//! Selection of releases to install.
//!
//! Each top-level requirement picks the highest release that targets the
//! active game version and satisfies the requirement, then policy checks
//! (hold, reinstall, downgrade) decide whether it enters the plan. Declared
//! dependencies are expanded afterwards in passes until a pass adds nothing.
//! There is no backtracking: a dependency only ever considers its single
//! highest matching release.

mod plan;

use anyhow::Result;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::package::{Requirement, Version};
use crate::provider::{Mod, ModCatalog, Release};
use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModArtifact, ModStore, satisfied_by};

pub use plan::{Decision, InstallPlan, InstallReason, PlanEntry, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolveOptions {
    /// Install held mods anyway
    pub held: bool,
    pub reinstall: bool,
    pub downgrade: bool,
    pub ignore_game_version: bool,
}

/// Plan and per-requirement decisions for one resolver run.
#[derive(Debug, Default)]
pub struct Resolution {
    pub plan: InstallPlan,
    /// One decision per top-level requirement, in input order. Chosen
    /// requirements carry the resolved mod name.
    pub decisions: Vec<(Requirement, Decision)>,
    /// Set when dependency expansion stopped early. The plan still holds
    /// the top-level entries and every completed expansion pass.
    pub dependency_error: Option<anyhow::Error>,
}

enum Selection {
    Chosen(PlanEntry),
    Skipped(SkipReason),
    NoMatch,
}

pub struct DependencyResolver<'a, R: Runtime, C: ModCatalog + ?Sized> {
    store: &'a ModStore<R>,
    catalog: &'a C,
    options: ResolveOptions,
    remote: HashMap<String, Arc<Mod>>,
}

impl<'a, R: Runtime, C: ModCatalog + ?Sized> DependencyResolver<'a, R, C> {
    pub fn new(store: &'a ModStore<R>, catalog: &'a C, options: ResolveOptions) -> Self {
        Self {
            store,
            catalog,
            options,
            remote: HashMap::new(),
        }
    }

    /// Resolve top-level requirements, then expand dependencies unless
    /// `with_dependencies` is false.
    ///
    /// Per-requirement failures become [`Decision::Failed`]; only a failure
    /// to read the mods directory is returned as an error.
    #[tracing::instrument(skip(self, requirements))]
    pub async fn resolve(
        &mut self,
        requirements: &[Requirement],
        with_dependencies: bool,
    ) -> Result<Resolution> {
        let installed = self.store.scan()?;
        let mut resolution = Resolution::default();

        for req in requirements {
            let mut req = req.clone();
            let decision = match self.select(&req, &installed).await {
                Ok(Selection::Chosen(entry)) => {
                    let reason = entry.reason;
                    req = req.with_name(entry.name.clone());
                    if resolution.plan.push(entry) {
                        Decision::Install(reason)
                    } else {
                        Decision::Skipped(SkipReason::AlreadyPlanned)
                    }
                }
                Ok(Selection::Skipped(reason)) => Decision::Skipped(reason),
                Ok(Selection::NoMatch) => Decision::Failed(format!("No match found for {}", req)),
                Err(e) => Decision::Failed(format!("{:#}", e)),
            };
            debug!("{}: {:?}", req, decision);
            resolution.decisions.push((req, decision));
        }

        if with_dependencies
            && let Err(e) = self
                .expand_dependencies(&installed, &mut resolution.plan)
                .await
        {
            resolution.dependency_error = Some(e);
        }
        Ok(resolution)
    }

    /// Pick the release for one top-level requirement.
    async fn select(&mut self, req: &Requirement, installed: &[InstalledMod]) -> Result<Selection> {
        let name = self
            .store
            .resolve_name(req.bare_name(), Some(self.catalog))
            .await?;
        let req = req.with_name(name.clone());

        if !self.options.held && self.store.is_held(&name) {
            return Ok(Selection::Skipped(SkipReason::Held));
        }

        let Some(chosen) = self.candidates(&req).await?.into_iter().next() else {
            return Ok(Selection::NoMatch);
        };

        let current = installed_version(installed, &name);
        if let Some(current) = current {
            if chosen.version == *current && !self.options.reinstall {
                return Ok(Selection::Skipped(SkipReason::AlreadyInstalled));
            }
            if chosen.version < *current && !self.options.downgrade {
                return Ok(Selection::Skipped(SkipReason::DowngradeBlocked));
            }
        }

        Ok(Selection::Chosen(PlanEntry {
            reason: InstallReason::classify(current, &chosen.version),
            name,
            release: chosen,
        }))
    }

    /// Releases of `req`'s mod that target the active game version (unless
    /// ignored) and satisfy `req`, highest version first. Equal versions
    /// keep catalog order.
    pub async fn candidates(&mut self, req: &Requirement) -> Result<Vec<Release>> {
        let remote = self.remote_mod(req.bare_name()).await?;
        let game_version = self.store.game_version().major_minor();

        let mut releases: Vec<Release> = remote
            .releases
            .iter()
            .filter(|r| self.options.ignore_game_version || r.game_version == game_version)
            .filter(|r| req.matches(&r.version))
            .cloned()
            .collect();
        releases.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(releases)
    }

    /// The highest release newer than `installed` for the active game
    /// version, if any.
    pub async fn find_update(&mut self, installed: &InstalledMod) -> Result<Option<Release>> {
        let req = Requirement::any(installed.name());
        Ok(self
            .candidates(&req)
            .await?
            .into_iter()
            .next()
            .filter(|r| r.version > *installed.version()))
    }

    async fn remote_mod(&mut self, name: &str) -> Result<Arc<Mod>> {
        if let Some(m) = self.remote.get(name) {
            return Ok(Arc::clone(m));
        }
        let m = Arc::new(self.catalog.get_mod(name).await?);
        self.remote.insert(name.to_string(), Arc::clone(&m));
        Ok(m)
    }

    /// Add missing dependencies of installed and planned mods until a pass
    /// adds nothing.
    ///
    /// A failing pass is discarded as a whole and reported as
    /// [`Error::UnmetDependency`]; entries from earlier passes stay in the
    /// plan.
    #[tracing::instrument(skip(self, installed, plan))]
    pub async fn expand_dependencies(
        &mut self,
        installed: &[InstalledMod],
        plan: &mut InstallPlan,
    ) -> Result<()> {
        loop {
            let additions = self.expansion_pass(installed, plan).await?;
            if additions.is_empty() {
                return Ok(());
            }
            for entry in additions {
                info!("Adding dependency: {} {}", entry.name, entry.release.version);
                plan.push(entry);
            }
        }
    }

    async fn expansion_pass(
        &mut self,
        installed: &[InstalledMod],
        plan: &InstallPlan,
    ) -> Result<Vec<PlanEntry>> {
        // Installed mods about to be replaced contribute the dependencies of
        // their planned release instead.
        let current: Vec<InstalledMod> = installed
            .iter()
            .filter(|m| plan.get(m.name()).is_none())
            .cloned()
            .collect();

        let mut declared: Vec<Requirement> = current.iter().flat_map(|m| m.info().requirements()).collect();
        for entry in plan.entries() {
            declared.extend(entry.release.requirements(&entry.name));
        }

        let game_version = self.store.game_version().clone();
        let mut additions: Vec<PlanEntry> = Vec::new();

        for dep in declared {
            if dep.is_base() || !dep.kind().is_required() {
                continue;
            }
            let req = dep.with_name(dep.bare_name());

            if let Some(planned) = plan
                .get(&req.name)
                .or_else(|| additions.iter().find(|e| e.name == req.name))
            {
                if req.matches(&planned.release.version) {
                    continue;
                }
                return Err(unmet(
                    &dep,
                    format!("conflicts with {} {}", planned.name, planned.release.version),
                ));
            }

            if satisfied_by(&current, &req, &game_version, self.options.ignore_game_version) {
                continue;
            }

            let chosen = match self.candidates(&req).await {
                Ok(releases) => releases.into_iter().next(),
                Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => {
                    return Err(unmet(&dep, "not found in the catalog".to_string()));
                }
                Err(e) => return Err(e),
            };
            let Some(release) = chosen else {
                return Err(unmet(&dep, "no matching release".to_string()));
            };

            additions.push(PlanEntry {
                reason: InstallReason::classify(
                    installed_version(installed, &req.name),
                    &release.version,
                ),
                name: req.name,
                release,
            });
        }

        Ok(additions)
    }
}

fn installed_version<'m>(installed: &'m [InstalledMod], name: &str) -> Option<&'m Version> {
    installed
        .iter()
        .filter(|m| m.name() == name)
        .map(|m| m.version())
        .max()
}

fn unmet(dep: &Requirement, reason: String) -> anyhow::Error {
    Error::UnmetDependency {
        requirement: dep.to_string(),
        reason,
    }
    .into()
}

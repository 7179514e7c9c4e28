use std::fmt;

use crate::package::Version;
use crate::provider::Release;

/// Why a release is going to be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    New,
    Upgrade,
    Downgrade,
    Reinstall,
}

impl InstallReason {
    /// Classify `chosen` against the installed version, if any.
    pub fn classify(installed: Option<&Version>, chosen: &Version) -> Self {
        match installed {
            None => InstallReason::New,
            Some(current) if chosen > current => InstallReason::Upgrade,
            Some(current) if chosen < current => InstallReason::Downgrade,
            Some(_) => InstallReason::Reinstall,
        }
    }
}

impl fmt::Display for InstallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InstallReason::New => "new",
            InstallReason::Upgrade => "upgrade",
            InstallReason::Downgrade => "downgrade",
            InstallReason::Reinstall => "reinstall",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub name: String,
    pub release: Release,
    pub reason: InstallReason,
}

/// Releases to install, in resolution order, at most one per mod name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstallPlan {
    entries: Vec<PlanEntry>,
}

impl InstallPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` unless the mod is already planned. Returns whether it
    /// was added.
    pub fn push(&mut self, entry: PlanEntry) -> bool {
        if self.get(&entry.name).is_some() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn get(&self, name: &str) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for InstallPlan {
    type Item = PlanEntry;
    type IntoIter = std::vec::IntoIter<PlanEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Why a top-level requirement produced no plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyInstalled,
    DowngradeBlocked,
    Held,
    /// An earlier requirement already planned this mod.
    AlreadyPlanned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::AlreadyInstalled => "already installed, use -R to reinstall it",
            SkipReason::DowngradeBlocked => {
                "already installed in a more recent version, use -D to downgrade it"
            }
            SkipReason::Held => "held, use -H to install it anyway",
            SkipReason::AlreadyPlanned => "already selected by an earlier requirement",
        };
        f.write_str(text)
    }
}

/// Result of resolving one top-level requirement.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Install(InstallReason),
    Skipped(SkipReason),
    Failed(String),
}

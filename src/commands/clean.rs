use anyhow::Result;

use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModArtifact};

use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Automatic yes to confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Remove every installed copy of a mod except its highest version
#[tracing::instrument(skip(services))]
pub fn clean<R: Runtime>(services: &Services<R>, args: &CleanArgs) -> Result<()> {
    let mods = services.store().scan()?;
    let stale = outdated(&mods);

    if stale.is_empty() {
        println!("No old versions of mods to remove.");
        return Ok(());
    }

    println!("The following mods will be removed:");
    for m in &stale {
        println!("    {}", m.location().display());
    }
    if !args.yes && !services.runtime.confirm("Continue?")? {
        return Ok(());
    }

    for m in stale {
        m.remove(services.runtime.as_ref())?;
    }
    Ok(())
}

/// Copies that have a strictly higher version installed under the same
/// name. `mods` must be sorted by name then version.
fn outdated(mods: &[InstalledMod]) -> Vec<&InstalledMod> {
    mods.iter()
        .enumerate()
        .filter(|(i, m)| {
            mods[i + 1..]
                .iter()
                .take_while(|next| next.name() == m.name())
                .any(|next| next.version() > m.version())
        })
        .map(|(_, m)| m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockCredentialProvider;
    use crate::commands::services::test_support::services;
    use crate::download::MockDownloader;
    use crate::provider::MockModCatalog;
    use crate::store::test_support::{write_packed, write_unpacked};
    use tempfile::tempdir;

    #[test]
    fn test_clean_keeps_highest_version() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            MockModCatalog::new(),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        let mods_dir = services.context.mods_dir.clone();
        write_packed(&mods_dir, "foo", "1.0.0", Some("0.17"), &[]);
        write_unpacked(&mods_dir, "foo", "1.2.0", Some("0.17"), &[]);
        write_packed(&mods_dir, "foo", "1.1.0", Some("0.17"), &[]);
        write_packed(&mods_dir, "bar", "0.1.0", Some("0.17"), &[]);

        clean(&services, &CleanArgs { yes: true }).unwrap();

        let left: Vec<String> = services
            .store()
            .scan()
            .unwrap()
            .iter()
            .map(|m| format!("{}@{}", m.name(), m.version()))
            .collect();
        assert_eq!(left, vec!["bar@0.1.0", "foo@1.2.0"]);
    }

    #[test]
    fn test_same_version_in_both_forms_is_kept() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            MockModCatalog::new(),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        let mods_dir = services.context.mods_dir.clone();
        write_packed(&mods_dir, "foo", "1.0.0", Some("0.17"), &[]);
        write_unpacked(&mods_dir, "foo", "1.0.0", Some("0.17"), &[]);

        let mods = services.store().scan().unwrap();
        assert!(outdated(&mods).is_empty());
    }
}

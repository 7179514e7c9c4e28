use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModArtifact};

use super::local_matches;
use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RemoveArgs {
    /// Mod patterns to remove ('*' for all)
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,

    /// Automatic yes to confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Remove installed mods
#[tracing::instrument(skip(services))]
pub async fn remove<R: Runtime>(services: &Services<R>, args: &RemoveArgs) -> Result<()> {
    let store = services.store();

    let mut targets: Vec<InstalledMod> = Vec::new();
    for pattern in &args.mods {
        for m in local_matches(&store, pattern, None).await? {
            if !targets.iter().any(|t| t.location() == m.location()) {
                targets.push(m);
            }
        }
    }
    debug!("{} file(s) to remove", targets.len());

    if targets.is_empty() {
        println!("No matching files.");
        return Ok(());
    }

    println!("The following files will be removed:");
    for m in &targets {
        println!("    {}", m.location().display());
    }
    if !args.yes && !services.runtime.confirm("Continue?")? {
        return Ok(());
    }

    for m in &targets {
        m.remove(services.runtime.as_ref())?;
    }
    Ok(())
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

    #[tokio::test]
    async fn test_remove_by_pattern() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            MockModCatalog::new(),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        let mods_dir = services.context.mods_dir.clone();
        write_packed(&mods_dir, "foo-core", "1.0.0", Some("0.17"), &[]);
        write_unpacked(&mods_dir, "foo-extra", "1.0.0", Some("0.17"), &[]);
        write_packed(&mods_dir, "bar", "1.0.0", Some("0.17"), &[]);

        let args = RemoveArgs {
            mods: vec!["foo-*".into()],
            yes: true,
        };
        remove(&services, &args).await.unwrap();

        let left: Vec<String> = services
            .store()
            .scan()
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(left, vec!["bar"]);
    }

    #[tokio::test]
    async fn test_remove_resolves_partial_name() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            MockModCatalog::new(),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        write_packed(&services.context.mods_dir, "FooBar", "1.0.0", Some("0.17"), &[]);

        let args = RemoveArgs {
            mods: vec!["foob".into(), "missing".into()],
            yes: true,
        };
        remove(&services, &args).await.unwrap();
        assert!(services.store().scan().unwrap().is_empty());
    }
}

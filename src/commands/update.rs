use anyhow::{Result, bail};
use log::warn;

use crate::error::Error;
use crate::install::InstallOptions;
use crate::provider::Release;
use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModArtifact};

use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    /// Only show what would be updated
    #[arg(short = 's', long)]
    pub show: bool,

    /// Automatic yes to confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Allow updating unpacked mods
    #[arg(short = 'U', long)]
    pub unpacked: bool,

    /// Allow updating held mods
    #[arg(short = 'H', long)]
    pub held: bool,
}

/// Update installed mods to the newest release for the game version
#[tracing::instrument(skip(services))]
pub async fn update<R: Runtime>(services: &Services<R>, args: &UpdateArgs) -> Result<()> {
    let store = services.store();
    let installed = store.scan()?;
    let mut resolver = services.resolver(&store, services.context.resolve_options(true, false, false));

    let mut updates: Vec<(InstalledMod, Release)> = Vec::new();
    for local in installed {
        println!("Checking: {}", local.name());
        let release = match resolver.find_update(&local).await {
            Ok(Some(release)) => release,
            Ok(None) => continue,
            Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => {
                println!("Warning: {}", e);
                continue;
            }
            Err(e) => {
                warn!("Could not check {} for updates: {:#}", local.name(), e);
                continue;
            }
        };
        println!("Found update: {} {}", local.name(), release.version);

        let mut allowed = true;
        if !args.unpacked && !local.is_packed() {
            println!("{} is unpacked. Use -U to update it anyway.", local.name());
            allowed = false;
        }
        if !args.held && local.state().held {
            println!("{} is held. Use -H to update it anyway.", local.name());
            allowed = false;
        }
        if allowed {
            updates.push((local, release));
        }
    }

    if updates.is_empty() {
        println!("No updates were found");
        return Ok(());
    }

    println!(
        "Found {} update{}:",
        updates.len(),
        if updates.len() == 1 { "" } else { "s" }
    );
    for (local, release) in &updates {
        println!("    {} {} -> {}", local.name(), local.version(), release.version);
    }

    if args.show {
        return Ok(());
    }
    if !args.yes && !services.runtime.confirm("Continue?")? {
        return Ok(());
    }

    let orchestrator = services.orchestrator(&store);
    let mut failures = 0;
    for (local, release) in &updates {
        println!("Installing: {} {}...", local.name(), release.version);
        if let Err(e) = orchestrator
            .install(local.name(), release, InstallOptions::default())
            .await
        {
            eprintln!("Error: {:#}", e);
            failures += 1;
        }
    }
    if failures > 0 {
        bail!("{} update(s) failed", failures);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MockCredentialProvider;
    use crate::commands::services::test_support::services;
    use crate::download::MockDownloader;
    use crate::http::DownloadStats;
    use crate::provider::MockModCatalog;
    use crate::provider::test_support::{release, remote_mod};
    use crate::store::test_support::{write_packed, write_unpacked};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn catalog_with(name: &'static str, versions: &'static [&'static str]) -> MockModCatalog {
        let mut catalog = MockModCatalog::new();
        catalog.expect_get_mod().with(eq(name)).returning(move |_| {
            Ok(remote_mod(
                name,
                versions
                    .iter()
                    .map(|v| release(name, v, "0.17", &[]))
                    .collect(),
            ))
        });
        catalog
    }

    #[tokio::test]
    async fn test_show_only_downloads_nothing() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            catalog_with("foo", &["1.0.0", "1.1.0"]),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        write_packed(&services.context.mods_dir, "foo", "1.0.0", Some("0.17"), &[]);

        let args = UpdateArgs {
            show: true,
            ..Default::default()
        };
        update(&services, &args).await.unwrap();
        assert_eq!(services.store().scan().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unpacked_mod_needs_flag() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            catalog_with("foo", &["1.1.0"]),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        write_unpacked(&services.context.mods_dir, "foo", "1.0.0", Some("0.17"), &[]);

        // No download expectation: any install attempt would panic the mock
        let args = UpdateArgs {
            yes: true,
            ..Default::default()
        };
        update(&services, &args).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_installs_newer_release() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let bytes =
            std::fs::read(write_packed(scratch.path(), "foo", "1.1.0", Some("0.17"), &[])).unwrap();
        let size = bytes.len() as u64;

        let mut catalog = MockModCatalog::new();
        catalog.expect_get_mod().with(eq("foo")).returning(move |_| {
            let mut newer = release("foo", "1.1.0", "0.17", &[]);
            newer.file_size = Some(size);
            Ok(remote_mod("foo", vec![release("foo", "1.0.0", "0.17", &[]), newer]))
        });
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .times(1)
            .returning(move |_, _, dest| {
                std::fs::write(dest, &bytes).unwrap();
                Ok(DownloadStats {
                    bytes: size,
                    content_length: Some(size),
                })
            });
        let mut credentials = MockCredentialProvider::new();
        credentials.expect_credentials().returning(|_| {
            Ok(crate::auth::Credentials {
                username: "alice".into(),
                token: "tok".into(),
            })
        });

        let services = services(dir.path(), catalog, downloader, credentials);
        write_packed(&services.context.mods_dir, "foo", "1.0.0", Some("0.17"), &[]);

        let args = UpdateArgs {
            yes: true,
            ..Default::default()
        };
        update(&services, &args).await.unwrap();

        let installed = services.store().get("foo").unwrap().unwrap();
        assert_eq!(installed.version().to_string(), "1.1.0");
        assert_eq!(services.store().scan().unwrap().len(), 1);
    }
}

use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::ModArtifact;

use super::local_matches;
use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct PackArgs {
    /// Mod patterns to affect
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,

    /// Replace an existing file or directory
    #[arg(short = 'R', long)]
    pub replace: bool,

    /// Keep the source directory or file afterwards
    #[arg(short = 'K', long)]
    pub keep: bool,
}

/// Convert installed mods to archives (`packing`) or to directories
#[tracing::instrument(skip(services))]
pub async fn pack<R: Runtime>(services: &Services<R>, args: &PackArgs, packing: bool) -> Result<()> {
    let store = services.store();
    let runtime = services.runtime.as_ref();
    let verb = if packing { "pack" } else { "unpack" };

    for pattern in &args.mods {
        let mods = local_matches(&store, pattern, Some(!packing)).await?;
        if mods.is_empty() {
            println!("No {}able mod found for {}.", verb, pattern);
            continue;
        }

        for m in mods {
            let duplicate = store.scan()?.iter().any(|other| {
                other.name() == m.name()
                    && other.version() == m.version()
                    && other.is_packed() == packing
            });
            if duplicate && !args.replace {
                println!("{} is already {}ed. Use -R to replace it.", m.name(), verb);
                continue;
            }

            let result = if packing {
                m.pack(runtime, args.replace, args.keep)?
            } else {
                m.unpack(runtime, args.replace, args.keep, Some(&services.cleanup))?
            };
            match result {
                Some(path) => {
                    debug!("{} -> {}", m.location().display(), path.display());
                    println!("{} is now {}ed", m.name(), verb);
                }
                None => println!("{} is already {}ed. Use -R to replace it.", m.name(), verb),
            }
        }
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

    fn entries(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_unpack_then_pack() {
        let dir = tempdir().unwrap();
        let services = services(
            dir.path(),
            MockModCatalog::new(),
            MockDownloader::new(),
            MockCredentialProvider::new(),
        );
        let mods_dir = services.context.mods_dir.clone();
        write_packed(&mods_dir, "foo", "1.0.0", Some("0.17"), &[]);

        let args = PackArgs {
            mods: vec!["foo".into()],
            ..Default::default()
        };
        pack(&services, &args, false).await.unwrap();
        assert_eq!(entries(&mods_dir), vec!["foo_1.0.0"]);

        pack(&services, &args, true).await.unwrap();
        assert_eq!(entries(&mods_dir), vec!["foo_1.0.0.zip"]);
    }

    #[tokio::test]
    async fn test_existing_counterpart_needs_replace() {
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

        let args = PackArgs {
            mods: vec!["foo".into()],
            keep: true,
            ..Default::default()
        };
        pack(&services, &args, false).await.unwrap();
        assert_eq!(entries(&mods_dir), vec!["foo_1.0.0", "foo_1.0.0.zip"]);

        let args = PackArgs {
            replace: true,
            ..args
        };
        pack(&services, &args, false).await.unwrap();
        assert_eq!(entries(&mods_dir), vec!["foo_1.0.0", "foo_1.0.0.zip"]);
    }
}

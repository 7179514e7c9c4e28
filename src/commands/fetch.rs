use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::error::Error;
use crate::package::Requirement;
use crate::resolver::ResolveOptions;
use crate::runtime::Runtime;
use crate::store::{ModState, PackedMod};

use super::services::Services;

#[derive(clap::Args, Debug, Clone)]
pub struct FetchArgs {
    /// Requirements to fetch ("name", "name>=1.0", "name==1.2", ...)
    #[arg(value_name = "REQUIREMENT", required = true)]
    pub requirements: Vec<String>,

    /// Unpack the archive after downloading
    #[arg(short = 'U', long)]
    pub unpack: bool,

    /// Keep the archive after unpacking
    #[arg(short = 'K', long)]
    pub keep: bool,

    /// Destination directory
    #[arg(short = 'd', long, value_name = "DIR", default_value = ".")]
    pub dest: PathBuf,

    /// Replace an existing file or directory
    #[arg(short = 'R', long)]
    pub replace: bool,
}

/// Download releases to a directory without installing them
#[tracing::instrument(skip(services))]
pub async fn fetch<R: Runtime>(services: &Services<R>, args: &FetchArgs) -> Result<()> {
    let store = services.store();
    let options = ResolveOptions {
        ignore_game_version: true,
        ..Default::default()
    };
    let mut resolver = services.resolver(&store, options);
    let orchestrator = services.orchestrator(&store);
    let runtime = services.runtime.as_ref();
    let mut failures = 0;

    for input in &args.requirements {
        let req: Requirement = input.parse()?;
        let name = match store
            .resolve_name(req.bare_name(), Some(services.catalog.as_ref()))
            .await
        {
            Ok(name) => name,
            Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => {
                println!("Error: {}", e);
                failures += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        let req = req.with_name(name);

        let Some(release) = resolver.candidates(&req).await?.into_iter().next() else {
            println!("No match found for {}", req);
            failures += 1;
            continue;
        };

        println!("Saving to: {}", args.dest.join(&release.file_name).display());
        let Some(path) = orchestrator.fetch(&release, &args.dest, args.replace).await? else {
            println!(
                "File {} already exists. Use -R to replace it.",
                args.dest.join(&release.file_name).display()
            );
            continue;
        };

        if args.unpack {
            let packed = PackedMod::load(runtime, &path, ModState::default())?;
            if packed
                .unpack(runtime, args.replace, args.keep, Some(&services.cleanup))?
                .is_none()
            {
                println!("{} is already unpacked. Use -R to replace it.", packed.info.name);
            }
        }
    }

    if failures > 0 {
        bail!("{} requirement(s) could not be fetched", failures);
    }
    Ok(())
}

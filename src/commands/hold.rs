use anyhow::Result;

use crate::runtime::Runtime;

use super::resolve_local;
use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct HoldArgs {
    /// Mods to hold; lists held mods when empty
    #[arg(value_name = "MOD")]
    pub mods: Vec<String>,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct UnholdArgs {
    /// Mods to unhold
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,
}

/// Exclude mods from updates, or list held mods
#[tracing::instrument(skip(services))]
pub async fn hold<R: Runtime>(services: &mut Services<R>, args: &HoldArgs) -> Result<()> {
    let config = &services.config;
    if args.mods.is_empty() {
        if config.hold.is_empty() {
            println!("No held mods.");
        } else {
            println!("Mods currently held:");
            for name in &config.hold {
                println!("    {}", name);
            }
        }
        return Ok(());
    }

    let store = services.store();
    for input in &args.mods {
        let Some(name) = resolve_local(&store, input).await? else {
            println!("{} is not installed.", input);
            continue;
        };
        if services.config.hold(&name) {
            services.config.save(services.runtime.as_ref())?;
            println!("{} will not be updated automatically anymore", name);
        } else {
            println!("{} is already held", name);
        }
    }
    Ok(())
}

/// Let held mods be updated again
#[tracing::instrument(skip(services))]
pub fn unhold<R: Runtime>(services: &mut Services<R>, args: &UnholdArgs) -> Result<()> {
    for name in &args.mods {
        if services.config.unhold(name) {
            services.config.save(services.runtime.as_ref())?;
            println!("{} will now be updated automatically.", name);
        } else {
            println!("{} is not held.", name);
        }
    }
    Ok(())
}

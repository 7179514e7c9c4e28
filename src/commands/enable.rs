use anyhow::Result;

use crate::package::ModList;
use crate::runtime::Runtime;

use super::resolve_local;
use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct EnableArgs {
    /// Mods to affect
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,
}

/// Enable or disable mods in `mod-list.json`
#[tracing::instrument(skip(services))]
pub async fn set_enabled<R: Runtime>(
    services: &Services<R>,
    args: &EnableArgs,
    enabled: bool,
) -> Result<()> {
    let store = services.store();
    let verb = if enabled { "enabled" } else { "disabled" };

    for input in &args.mods {
        // Entries such as `base` are listed without being installed
        let listed = || -> Result<bool> {
            let list = ModList::load(services.runtime.as_ref(), store.mods_dir())?;
            Ok(list.mods.iter().any(|m| m.name == *input))
        };
        let name = match resolve_local(&store, input).await? {
            Some(name) => name,
            None if listed()? => input.clone(),
            None => {
                println!("Mod {} does not exist", input);
                continue;
            }
        };

        if store.set_enabled(&name, enabled)? {
            println!("{} is now {}", name, verb);
        } else {
            println!("{} was already {}", name, verb);
        }
    }
    Ok(())
}

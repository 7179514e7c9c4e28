use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModArtifact, ModState, UnpackedMod};

use super::local_matches;
use super::services::Services;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct MakeCompatibleArgs {
    /// Mod patterns to affect
    #[arg(value_name = "MOD", required = true)]
    pub mods: Vec<String>,
}

/// Rewrite `factorio_version` of mods to the current game major.minor.
///
/// Packed mods are unpacked first; unpacked ones are edited in place.
#[tracing::instrument(skip(services))]
pub async fn make_compatible<R: Runtime>(
    services: &Services<R>,
    args: &MakeCompatibleArgs,
) -> Result<()> {
    let store = services.store();
    let runtime = services.runtime.as_ref();
    let game_version = store.game_version().major_minor();

    for pattern in &args.mods {
        let mods: Vec<InstalledMod> = local_matches(&store, pattern, None)
            .await?
            .into_iter()
            .filter(|m| m.game_version() != game_version)
            .collect();
        if mods.is_empty() {
            println!("No match for {}.", pattern);
            continue;
        }

        for m in mods {
            let unpacked = match &m {
                InstalledMod::Unpacked(u) => u.clone(),
                InstalledMod::Packed(p) => {
                    let dir = match p.unpack(runtime, false, false, Some(&services.cleanup))? {
                        Some(dir) => dir,
                        None => {
                            debug!("{} already unpacked, editing the directory", p.basename());
                            p.path.with_file_name(p.basename())
                        }
                    };
                    UnpackedMod::load(runtime, &dir, ModState::default())?
                }
            };

            let mut info = unpacked.info.clone();
            info.factorio_version = Some(game_version.to_string());
            unpacked.write_info(runtime, &info)?;
            println!(
                "Game version changed to {} for {} {}.",
                game_version,
                info.name,
                info.version
            );
        }
    }
    Ok(())
}

use anyhow::Result;
use log::debug;

use crate::runtime::Runtime;
use crate::store::ModArtifact;

use super::services::Services;

/// List installed mods and their status
#[tracing::instrument(skip(services))]
pub fn list<R: Runtime>(services: &Services<R>) -> Result<()> {
    let mods = services.store().scan()?;
    debug!("Found {} mod(s)", mods.len());

    if mods.is_empty() {
        println!("No mods installed.");
        return Ok(());
    }

    let (enabled, disabled): (Vec<_>, Vec<_>) = mods.iter().partition(|m| m.state().enabled);
    for (title, group) in [("Enabled", enabled), ("Disabled", disabled)] {
        if group.is_empty() {
            continue;
        }
        println!("{} mods:", title);
        for m in group {
            let mut flags = Vec::new();
            if !m.is_packed() {
                flags.push("unpacked");
            }
            if m.state().held {
                flags.push("held");
            }
            if flags.is_empty() {
                println!("    {} {}", m.name(), m.version());
            } else {
                println!("    {} {} ({})", m.name(), m.version(), flags.join(", "));
            }
        }
        println!();
    }
    Ok(())
}

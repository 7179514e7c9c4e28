use anyhow::Result;

use crate::error::Error;
use crate::provider::ModCatalog;
use crate::runtime::Runtime;
use crate::store::{InstalledMod, ModStore};

mod clean;
mod enable;
mod fetch;
mod hold;
mod install;
mod list;
mod make_compatible;
mod pack;
mod remove;
mod search;
pub mod services;
mod show;
mod update;

pub use clean::{CleanArgs, clean};
pub use enable::{EnableArgs, set_enabled};
pub use fetch::{FetchArgs, fetch};
pub use hold::{HoldArgs, UnholdArgs, hold, unhold};
pub use install::{InstallArgs, install};
pub use list::list;
pub use make_compatible::{MakeCompatibleArgs, make_compatible};
pub use pack::{PackArgs, pack};
pub use remove::{RemoveArgs, remove};
pub use search::{SearchArgs, search};
pub use services::Services;
pub use show::{ShowArgs, show};
pub use update::{UpdateArgs, update};

/// Resolve user input against installed mods only.
///
/// Returns `None` when nothing installed matches.
pub(crate) async fn resolve_local<R: Runtime>(
    store: &ModStore<R>,
    input: &str,
) -> Result<Option<String>> {
    match store.resolve_name::<dyn ModCatalog>(input, None).await {
        Ok(name) => Ok(Some(name)),
        Err(e) if matches!(Error::find(&e), Some(Error::ModNotFound(_))) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Installed mods matching a name, partial name or `*` pattern.
pub(crate) async fn local_matches<R: Runtime>(
    store: &ModStore<R>,
    pattern: &str,
    packed: Option<bool>,
) -> Result<Vec<InstalledMod>> {
    match resolve_local(store, pattern).await? {
        Some(name) => store.find(Some(&name), None, packed),
        None => Ok(Vec::new()),
    }
}

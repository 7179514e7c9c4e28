//! Mod metadata: versions, requirements and the on-disk JSON files.

mod info;
mod mod_list;
mod requirement;
mod version;

pub use info::ModInfo;
pub(crate) use info::parse_dependencies;
pub use mod_list::{EnabledFlag, MOD_LIST_FILE, ModList, ModListEntry, set_mod_enabled};
pub use requirement::{BASE_MOD, DependencyKind, Operator, Requirement};
pub use version::{DEFAULT_GAME_VERSION, Version};

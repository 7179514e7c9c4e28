//! Conversion between packed (`.zip`) and unpacked (directory) mods.
//!
//! A packed mod keeps all of its files under one top-level directory, named
//! by the first entry of the archive, with `info.json` directly inside it.
//! Entries outside that directory are ignored on extraction and every entry
//! name goes through [`sanitize_entry`] before it touches the filesystem.

mod codec;
mod sanitize;

pub use codec::{ArchiveCodec, PackedManifest};
pub use sanitize::{SanitizedEntry, sanitize_entry};

pub const INFO_FILE: &str = "info.json";

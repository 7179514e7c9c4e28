use anyhow::{Result, anyhow};
use log::info;
use std::path::{Path, PathBuf};

use crate::archive::{ArchiveCodec, INFO_FILE};
use crate::cleanup::SharedCleanupContext;
use crate::package::{ModInfo, Version};
use crate::runtime::Runtime;

/// Enable and hold flags of an installed mod at scan time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModState {
    pub enabled: bool,
    pub held: bool,
}

/// Behavior shared by both on-disk representations.
pub trait ModArtifact {
    fn info(&self) -> &ModInfo;
    fn location(&self) -> &Path;
    fn state(&self) -> ModState;
    fn is_packed(&self) -> bool;

    /// Delete the artifact from disk.
    fn remove<R: Runtime>(&self, runtime: &R) -> Result<()>;

    fn name(&self) -> &str {
        &self.info().name
    }

    fn version(&self) -> &Version {
        &self.info().version
    }

    fn game_version(&self) -> Version {
        self.info().game_version()
    }

    /// File or directory name without the `.zip` extension.
    fn basename(&self) -> String {
        let location = self.location();
        let name = if self.is_packed() {
            location.file_stem()
        } else {
            location.file_name()
        };
        name.map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A mod installed as a `.zip` archive.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedMod {
    pub path: PathBuf,
    /// Directory the archive keeps its files under.
    pub toplevel: String,
    pub info: ModInfo,
    pub state: ModState,
}

/// A mod installed as an extracted directory.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpackedMod {
    pub path: PathBuf,
    pub info: ModInfo,
    pub state: ModState,
}

impl PackedMod {
    pub fn load<R: Runtime>(runtime: &R, path: &Path, state: ModState) -> Result<Self> {
        let manifest = ArchiveCodec::read_info(runtime, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            toplevel: manifest.toplevel,
            info: manifest.info,
            state,
        })
    }

    /// Extract next to the archive into a directory named after the archive.
    ///
    /// Returns the new directory, or `None` if it already existed and
    /// `replace` was not set. The archive is deleted unless `keep` is set.
    #[tracing::instrument(skip(self, runtime, cleanup_ctx))]
    pub fn unpack<R: Runtime>(
        &self,
        runtime: &R,
        replace: bool,
        keep: bool,
        cleanup_ctx: Option<&SharedCleanupContext>,
    ) -> Result<Option<PathBuf>> {
        let dest = sibling(&self.path, &self.basename())?;
        if !ArchiveCodec::unpack(runtime, &self.path, &dest, replace, cleanup_ctx)? {
            return Ok(None);
        }
        if !keep {
            runtime.remove_file(&self.path)?;
        }
        Ok(Some(dest))
    }
}

impl UnpackedMod {
    pub fn load<R: Runtime>(runtime: &R, path: &Path, state: ModState) -> Result<Self> {
        let text = runtime.read_to_string(&path.join(INFO_FILE))?;
        Ok(Self {
            path: path.to_path_buf(),
            info: ModInfo::parse(&text)?,
            state,
        })
    }

    /// Archive the directory as `<dirname>.zip` next to it.
    ///
    /// Returns the new archive, or `None` if it already existed and
    /// `replace` was not set. The directory is deleted unless `keep` is set.
    #[tracing::instrument(skip(self, runtime))]
    pub fn pack<R: Runtime>(&self, runtime: &R, replace: bool, keep: bool) -> Result<Option<PathBuf>> {
        let archive = sibling(&self.path, &format!("{}.zip", self.basename()))?;
        if !ArchiveCodec::pack(runtime, &self.path, &archive, replace)? {
            return Ok(None);
        }
        if !keep {
            runtime.remove_dir_all(&self.path)?;
        }
        Ok(Some(archive))
    }

    pub fn write_info<R: Runtime>(&self, runtime: &R, info: &ModInfo) -> Result<()> {
        runtime.write(&self.path.join(INFO_FILE), info.to_json()?.as_bytes())
    }
}

fn sibling(path: &Path, name: &str) -> Result<PathBuf> {
    path.parent()
        .map(|parent| parent.join(name))
        .ok_or_else(|| anyhow!("{} has no parent directory", path.display()))
}

impl ModArtifact for PackedMod {
    fn info(&self) -> &ModInfo {
        &self.info
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> ModState {
        self.state
    }

    fn is_packed(&self) -> bool {
        true
    }

    fn remove<R: Runtime>(&self, runtime: &R) -> Result<()> {
        info!("Removing {}", self.path.display());
        runtime.remove_file(&self.path)
    }
}

impl ModArtifact for UnpackedMod {
    fn info(&self) -> &ModInfo {
        &self.info
    }

    fn location(&self) -> &Path {
        &self.path
    }

    fn state(&self) -> ModState {
        self.state
    }

    fn is_packed(&self) -> bool {
        false
    }

    fn remove<R: Runtime>(&self, runtime: &R) -> Result<()> {
        info!("Removing {}", self.path.display());
        runtime.remove_dir_all(&self.path)
    }
}

/// An installed mod in either representation.
#[derive(Debug, Clone, PartialEq)]
pub enum InstalledMod {
    Packed(PackedMod),
    Unpacked(UnpackedMod),
}

impl InstalledMod {
    /// Unpack a packed mod. Unpacked mods are left alone and yield `None`.
    pub fn unpack<R: Runtime>(
        &self,
        runtime: &R,
        replace: bool,
        keep: bool,
        cleanup_ctx: Option<&SharedCleanupContext>,
    ) -> Result<Option<PathBuf>> {
        match self {
            InstalledMod::Packed(m) => m.unpack(runtime, replace, keep, cleanup_ctx),
            InstalledMod::Unpacked(_) => Ok(None),
        }
    }

    /// Pack an unpacked mod. Packed mods are left alone and yield `None`.
    pub fn pack<R: Runtime>(&self, runtime: &R, replace: bool, keep: bool) -> Result<Option<PathBuf>> {
        match self {
            InstalledMod::Packed(_) => Ok(None),
            InstalledMod::Unpacked(m) => m.pack(runtime, replace, keep),
        }
    }
}

impl ModArtifact for InstalledMod {
    fn info(&self) -> &ModInfo {
        match self {
            InstalledMod::Packed(m) => &m.info,
            InstalledMod::Unpacked(m) => &m.info,
        }
    }

    fn location(&self) -> &Path {
        match self {
            InstalledMod::Packed(m) => &m.path,
            InstalledMod::Unpacked(m) => &m.path,
        }
    }

    fn state(&self) -> ModState {
        match self {
            InstalledMod::Packed(m) => m.state,
            InstalledMod::Unpacked(m) => m.state,
        }
    }

    fn is_packed(&self) -> bool {
        matches!(self, InstalledMod::Packed(_))
    }

    fn remove<R: Runtime>(&self, runtime: &R) -> Result<()> {
        match self {
            InstalledMod::Packed(m) => m.remove(runtime),
            InstalledMod::Unpacked(m) => m.remove(runtime),
        }
    }
}

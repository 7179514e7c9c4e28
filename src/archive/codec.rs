use anyhow::{Context, Result, anyhow};
use log::{debug, info, warn};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{INFO_FILE, sanitize_entry};
use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::error::Error;
use crate::package::ModInfo;
use crate::runtime::Runtime;

/// What a packed mod declares about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedManifest {
    /// Name of the directory every entry lives under.
    pub toplevel: String,
    pub info: ModInfo,
}

/// Reads, packs and unpacks mod archives.
pub struct ArchiveCodec;

impl ArchiveCodec {
    /// Read `info.json` from the archive's top-level directory.
    #[tracing::instrument(skip(runtime))]
    pub fn read_info<R: Runtime>(runtime: &R, archive_path: &Path) -> Result<PackedManifest> {
        let mut archive = open_archive(runtime, archive_path)?;
        let toplevel = toplevel(&mut archive, archive_path)?;

        let info_name = format!("{}/{}", toplevel, INFO_FILE);
        let mut entry = archive
            .by_name(&info_name)
            .with_context(|| format!("No {} in {}", info_name, archive_path.display()))?;
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to read {}", info_name))?;
        let info = ModInfo::parse(&text)
            .with_context(|| format!("Invalid {} in {}", INFO_FILE, archive_path.display()))?;

        Ok(PackedManifest { toplevel, info })
    }

    /// Extract `archive_path` into `dest`.
    ///
    /// Returns `false` without touching anything when `dest` exists and
    /// `replace` is not set. On any failure the partially written `dest` is
    /// removed before the error is returned.
    #[tracing::instrument(skip(runtime, cleanup_ctx))]
    pub fn unpack<R: Runtime>(
        runtime: &R,
        archive_path: &Path,
        dest: &Path,
        replace: bool,
        cleanup_ctx: Option<&SharedCleanupContext>,
    ) -> Result<bool> {
        let mut archive = open_archive(runtime, archive_path)?;
        let toplevel = toplevel(&mut archive, archive_path)?;

        if runtime.exists(dest) {
            if !replace {
                info!("{} already exists, not unpacking", dest.display());
                return Ok(false);
            }
            debug!("Replacing existing directory {:?}", dest);
            runtime.remove_dir_all(dest)?;
        }

        runtime.create_dir_all(dest)?;
        let guard = cleanup_ctx.map(|ctx| CleanupGuard::new(Arc::clone(ctx), dest.to_path_buf()));

        let result = extract_entries(runtime, &mut archive, archive_path, &toplevel, dest)
            .and_then(|()| {
                if runtime.exists(&dest.join(INFO_FILE)) {
                    Ok(())
                } else {
                    Err(anyhow!(
                        "{} has no {} under {}/",
                        archive_path.display(),
                        INFO_FILE,
                        toplevel
                    ))
                }
            });

        if let Err(e) = result {
            if let Err(cleanup_err) = runtime.remove_dir_all(dest) {
                warn!("Failed to remove {}: {}", dest.display(), cleanup_err);
            }
            if let Some(guard) = guard {
                guard.success();
            }
            return Err(e);
        }

        if let Some(guard) = guard {
            guard.success();
        }
        info!("Unpacked {} to {}", archive_path.display(), dest.display());
        Ok(true)
    }

    /// Write `source_dir` as an archive whose top-level directory is the
    /// directory's own name.
    ///
    /// Returns `false` without writing when `archive_path` exists and
    /// `replace` is not set.
    #[tracing::instrument(skip(runtime))]
    pub fn pack<R: Runtime>(
        runtime: &R,
        source_dir: &Path,
        archive_path: &Path,
        replace: bool,
    ) -> Result<bool> {
        if runtime.exists(archive_path) && !replace {
            info!("{} already exists, not packing", archive_path.display());
            return Ok(false);
        }

        let root_name = source_dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Invalid mod directory {}", source_dir.display()))?;

        let mut files = Vec::new();
        collect_files(runtime, source_dir, &mut files)?;
        files.sort();

        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.add_directory(format!("{}/", root_name), options)?;

        for file in &files {
            let relative = file.strip_prefix(source_dir)?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            writer.start_file(format!("{}/{}", root_name, name), options)?;
            writer
                .write_all(&runtime.read(file)?)
                .with_context(|| format!("Failed to add {} to archive", file.display()))?;
        }

        let buffer = writer.finish().context("Failed to finish archive")?;
        if let Err(e) = runtime.write(archive_path, buffer.get_ref()) {
            if runtime.exists(archive_path)
                && let Err(cleanup_err) = runtime.remove_file(archive_path)
            {
                warn!("Failed to remove {}: {}", archive_path.display(), cleanup_err);
            }
            return Err(e);
        }

        info!("Packed {} to {}", source_dir.display(), archive_path.display());
        Ok(true)
    }
}

fn open_archive<R: Runtime>(runtime: &R, archive_path: &Path) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    // ZipArchive needs Seek, so the archive is read into memory
    let buffer = runtime
        .read(archive_path)
        .with_context(|| format!("Failed to read archive {:?}", archive_path))?;
    ZipArchive::new(Cursor::new(buffer))
        .with_context(|| format!("Failed to parse ZIP archive {}", archive_path.display()))
}

/// The first path segment of the first entry.
fn toplevel<Rd: Read + Seek>(archive: &mut ZipArchive<Rd>, archive_path: &Path) -> Result<String> {
    let first = if archive.len() == 0 {
        String::new()
    } else {
        archive.by_index(0)?.name().replace('\\', "/")
    };

    let toplevel = first.split('/').next().unwrap_or_default();
    if toplevel.is_empty() || toplevel == "." || toplevel == ".." {
        return Err(Error::UnsafeArchiveEntry {
            archive: archive_path.to_path_buf(),
            entry: first,
        }
        .into());
    }
    Ok(toplevel.to_string())
}

fn extract_entries<R: Runtime, Rd: Read + Seek>(
    runtime: &R,
    archive: &mut ZipArchive<Rd>,
    archive_path: &Path,
    toplevel: &str,
    dest: &Path,
) -> Result<()> {
    let prefix = format!("{}/", toplevel);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read ZIP entry {}", i))?;

        let name = entry.name().replace('\\', "/");
        let Some(inner) = name.strip_prefix(&prefix) else {
            warn!(
                "Out-of-place entry {:?} in {} ignored",
                name,
                archive_path.display()
            );
            continue;
        };

        let sanitized = sanitize_entry(inner);
        if sanitized.had_unsafe_segments {
            warn!(
                "{}: unsafe segments dropped",
                Error::UnsafeArchiveEntry {
                    archive: archive_path.to_path_buf(),
                    entry: name.clone(),
                }
            );
        }
        if sanitized.path.as_os_str().is_empty() {
            continue;
        }

        let target = dest.join(&sanitized.path);
        if entry.is_dir() {
            runtime.create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            runtime.create_dir_all(parent)?;
        }
        let mut out = runtime.create_file(&target)?;
        std::io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract file {:?}", target))?;
    }

    Ok(())
}

fn collect_files<R: Runtime>(runtime: &R, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for path in runtime.read_dir(dir)? {
        if runtime.is_dir(&path) {
            collect_files(runtime, &path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup;
    use crate::runtime::RealRuntime;
    use std::fs::{self, File};
    use tempfile::tempdir;

    const INFO: &str = r#"{"name": "foo", "version": "1.0.0", "factorio_version": "0.17"}"#;

    fn create_test_archive(path: &Path, files: &[(&str, &str)]) -> Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, content) in files {
            zip.start_file(*name, options)?;
            zip.write_all(content.as_bytes())?;
        }

        zip.finish()?;
        Ok(())
    }

    #[test]
    fn test_read_info() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo_1.0.0.zip");
        create_test_archive(
            &archive_path,
            &[("foo_1.0.0/info.json", INFO), ("foo_1.0.0/data.lua", "")],
        )?;

        let manifest = ArchiveCodec::read_info(&RealRuntime, &archive_path)?;
        assert_eq!(manifest.toplevel, "foo_1.0.0");
        assert_eq!(manifest.info.name, "foo");
        assert_eq!(manifest.info.game_version().to_string(), "0.17");
        Ok(())
    }

    #[test]
    fn test_read_info_missing_manifest() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        create_test_archive(&archive_path, &[("foo/data.lua", "")])?;

        assert!(ArchiveCodec::read_info(&RealRuntime, &archive_path).is_err());
        Ok(())
    }

    #[test]
    fn test_read_info_corrupted_archive() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        fs::write(&archive_path, "corrupted data")?;

        assert!(ArchiveCodec::read_info(&RealRuntime, &archive_path).is_err());
        Ok(())
    }

    #[test]
    fn test_unpack() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo_1.0.0.zip");
        let dest = dir.path().join("foo_1.0.0");
        create_test_archive(
            &archive_path,
            &[
                ("foo_1.0.0/info.json", INFO),
                ("foo_1.0.0/graphics/icon.png", "png"),
            ],
        )?;

        assert!(ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None)?);
        assert_eq!(fs::read_to_string(dest.join("info.json"))?, INFO);
        assert_eq!(fs::read_to_string(dest.join("graphics/icon.png"))?, "png");
        Ok(())
    }

    #[test]
    fn test_unpack_never_writes_outside_destination() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("mods").join("foo");
        create_test_archive(
            &archive_path,
            &[
                ("foo/info.json", INFO),
                ("foo/../../evil.txt", "evil"),
                ("foo/a/../../../../evil2.txt", "evil"),
                ("foo//abs/x.txt", "x"),
            ],
        )?;

        assert!(ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None)?);
        assert!(!dir.path().join("evil.txt").exists());
        assert!(!dir.path().join("mods").join("evil.txt").exists());
        assert!(!dir.path().join("evil2.txt").exists());
        assert_eq!(fs::read_to_string(dest.join("evil.txt"))?, "evil");
        assert_eq!(fs::read_to_string(dest.join("a/evil2.txt"))?, "evil");
        assert!(dest.join("abs/x.txt").exists());
        Ok(())
    }

    #[test]
    fn test_unpack_ignores_out_of_place_entries() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(
            &archive_path,
            &[("foo/info.json", INFO), ("bar/other.txt", "bar")],
        )?;

        assert!(ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None)?);
        assert!(dest.join("info.json").exists());
        assert!(!dest.join("other.txt").exists());
        assert!(!dir.path().join("bar").exists());
        Ok(())
    }

    #[test]
    fn test_unpack_keeps_existing_destination() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(&archive_path, &[("foo/info.json", INFO)])?;
        fs::create_dir(&dest)?;
        fs::write(dest.join("local.txt"), "mine")?;

        assert!(!ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None)?);
        assert!(dest.join("local.txt").exists());
        assert!(!dest.join("info.json").exists());

        assert!(ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, true, None)?);
        assert!(!dest.join("local.txt").exists());
        assert!(dest.join("info.json").exists());
        Ok(())
    }

    #[test]
    fn test_unpack_without_toplevel_aborts() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(&archive_path, &[("/info.json", INFO)])?;

        let err = ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None).unwrap_err();
        assert!(matches!(
            Error::find(&err),
            Some(Error::UnsafeArchiveEntry { .. })
        ));
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_unpack_empty_archive_aborts() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(&archive_path, &[])?;

        assert!(ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, None).is_err());
        assert!(!dest.exists());
        Ok(())
    }

    #[test]
    fn test_unpack_failure_removes_partial_destination() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(&archive_path, &[("foo/data.lua", "-- no manifest")])?;

        let ctx = cleanup::new_shared();
        let result = ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, Some(&ctx));
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(ctx.lock().unwrap().paths().is_empty());
        Ok(())
    }

    #[test]
    fn test_unpack_unregisters_cleanup_on_success() -> Result<()> {
        let dir = tempdir()?;
        let archive_path = dir.path().join("foo.zip");
        let dest = dir.path().join("foo");
        create_test_archive(&archive_path, &[("foo/info.json", INFO)])?;

        let ctx = cleanup::new_shared();
        ArchiveCodec::unpack(&RealRuntime, &archive_path, &dest, false, Some(&ctx))?;
        assert!(ctx.lock().unwrap().paths().is_empty());
        Ok(())
    }

    #[test]
    fn test_pack_then_read_info() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("foo_1.0.0");
        fs::create_dir_all(source.join("locale/en"))?;
        fs::write(source.join("info.json"), INFO)?;
        fs::write(source.join("locale/en/strings.cfg"), "[mod-name]")?;
        let archive_path = dir.path().join("foo_1.0.0.zip");

        assert!(ArchiveCodec::pack(&RealRuntime, &source, &archive_path, false)?);

        let manifest = ArchiveCodec::read_info(&RealRuntime, &archive_path)?;
        assert_eq!(manifest.toplevel, "foo_1.0.0");
        assert_eq!(manifest.info.name, "foo");

        let mut archive = ZipArchive::new(File::open(&archive_path)?)?;
        let mut content = String::new();
        archive
            .by_name("foo_1.0.0/locale/en/strings.cfg")?
            .read_to_string(&mut content)?;
        assert_eq!(content, "[mod-name]");
        Ok(())
    }

    #[test]
    fn test_pack_write_failure_reports_write_error() {
        use crate::runtime::MockRuntime;
        use mockall::predicate::eq;
        use std::sync::atomic::{AtomicBool, Ordering};

        let source = PathBuf::from("/mods/foo_1.0.0");
        let archive_path = PathBuf::from("/mods/foo_1.0.0.zip");
        let info_path = source.join("info.json");
        let written = Arc::new(AtomicBool::new(false));

        let mut runtime = MockRuntime::new();
        let seen = Arc::clone(&written);
        runtime
            .expect_exists()
            .with(eq(archive_path.clone()))
            .returning(move |_| seen.load(Ordering::SeqCst));
        let listed = info_path.clone();
        runtime
            .expect_read_dir()
            .with(eq(source.clone()))
            .returning(move |_| Ok(vec![listed.clone()]));
        runtime.expect_is_dir().returning(|_| false);
        runtime
            .expect_read()
            .with(eq(info_path))
            .returning(|_| Ok(INFO.as_bytes().to_vec()));
        let partial = Arc::clone(&written);
        runtime.expect_write().times(1).returning(move |_, _| {
            partial.store(true, Ordering::SeqCst);
            Err(anyhow!("disk full"))
        });
        runtime
            .expect_remove_file()
            .with(eq(archive_path.clone()))
            .times(1)
            .returning(|_| Err(anyhow!("permission denied")));

        let err = ArchiveCodec::pack(&runtime, &source, &archive_path, false).unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_pack_keeps_existing_archive() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("foo");
        fs::create_dir(&source)?;
        fs::write(source.join("info.json"), INFO)?;
        let archive_path = dir.path().join("foo.zip");
        fs::write(&archive_path, "existing")?;

        assert!(!ArchiveCodec::pack(&RealRuntime, &source, &archive_path, false)?);
        assert_eq!(fs::read_to_string(&archive_path)?, "existing");

        assert!(ArchiveCodec::pack(&RealRuntime, &source, &archive_path, true)?);
        assert!(ArchiveCodec::read_info(&RealRuntime, &archive_path).is_ok());
        Ok(())
    }
}

//! Installing releases into the mods directory.
//!
//! A release is downloaded into `<write_path>/tmp`, checked against its
//! expected size and only then moved into the mods directory. The previous
//! artifact of the same mod is removed after the new one is in place.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::CredentialProvider;
use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::download::Downloader;
use crate::error::Error;
use crate::http::{DownloadStats, NonRetryableError};
use crate::package::Requirement;
use crate::provider::Release;
use crate::resolver::{Decision, Resolution, SkipReason};
use crate::runtime::Runtime;
use crate::store::{ModArtifact, ModState, ModStore, PackedMod};

/// Directory under the write path that holds downloads in progress.
pub const TMP_DIR: &str = "tmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstallOptions {
    /// Unpack after installing. `None` keeps the representation of the
    /// installed copy, packed for new mods.
    pub unpack: Option<bool>,
    /// Set the enabled flag. `None` leaves `mod-list.json` alone.
    pub enable: Option<bool>,
}

/// Final state of one requirement after its plan ran.
#[derive(Debug)]
pub enum Outcome {
    Installed(PathBuf),
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct Report {
    /// One outcome per top-level requirement, in input order.
    pub requirements: Vec<(Requirement, Outcome)>,
    /// Dependencies added by expansion, in plan order.
    pub dependencies: Vec<(String, Outcome)>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.requirements
            .iter()
            .map(|(_, outcome)| outcome)
            .chain(self.dependencies.iter().map(|(_, outcome)| outcome))
            .filter(|outcome| matches!(outcome, Outcome::Failed(_)))
            .count()
    }
}

pub struct InstallOrchestrator<'a, R, D, P>
where
    R: Runtime,
    D: Downloader + ?Sized,
    P: CredentialProvider + ?Sized,
{
    store: &'a ModStore<R>,
    downloader: &'a D,
    credentials: &'a P,
    write_path: PathBuf,
    cleanup_ctx: Option<SharedCleanupContext>,
}

impl<'a, R, D, P> InstallOrchestrator<'a, R, D, P>
where
    R: Runtime,
    D: Downloader + ?Sized,
    P: CredentialProvider + ?Sized,
{
    pub fn new(
        store: &'a ModStore<R>,
        downloader: &'a D,
        credentials: &'a P,
        write_path: PathBuf,
        cleanup_ctx: Option<SharedCleanupContext>,
    ) -> Self {
        Self {
            store,
            downloader,
            credentials,
            write_path,
            cleanup_ctx,
        }
    }

    fn runtime(&self) -> &R {
        self.store.runtime()
    }

    /// Install `release` as mod `name`. Returns the final location.
    #[tracing::instrument(skip(self, release, options), fields(file = %release.file_name))]
    pub async fn install(
        &self,
        name: &str,
        release: &Release,
        options: InstallOptions,
    ) -> Result<PathBuf> {
        validate_file_name(&release.file_name)?;

        let previous = self.store.get(name)?;
        let unpack = options
            .unpack
            .unwrap_or_else(|| previous.as_ref().is_some_and(|m| !m.is_packed()));

        let dest = self.store.mods_dir().join(&release.file_name);
        self.download_to(release, &dest).await?;

        let new_basename = dest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(old) = previous
            && (old.basename() != new_basename || !old.is_packed())
        {
            debug!("Replacing {}", old.location().display());
            old.remove(self.runtime())?;
        }

        if let Some(enable) = options.enable {
            self.store.set_enabled(name, enable)?;
        }

        if unpack {
            let packed = PackedMod::load(self.runtime(), &dest, ModState::default())?;
            if let Some(dir) = packed.unpack(self.runtime(), false, false, self.cleanup_ctx.as_ref())? {
                return Ok(dir);
            }
        }
        Ok(dest)
    }

    /// Install every planned entry, top-level ones first.
    ///
    /// A failing entry does not stop the others. A dependency expansion
    /// error is reported after the plan ran.
    pub async fn execute(&self, resolution: Resolution, options: InstallOptions) -> Report {
        let Resolution {
            plan,
            decisions,
            dependency_error,
        } = resolution;

        let mut installed: Vec<(String, Outcome)> = Vec::new();
        for entry in plan {
            println!("Installing: {} {}...", entry.name, entry.release.version);
            let outcome = match self.install(&entry.name, &entry.release, options).await {
                Ok(path) => Outcome::Installed(path),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    Outcome::Failed(format!("{:#}", e))
                }
            };
            installed.push((entry.name, outcome));
        }

        let mut report = Report::default();
        for (req, decision) in decisions {
            let outcome = match decision {
                Decision::Install(_) => match installed.iter().position(|(n, _)| *n == req.name) {
                    Some(i) => installed.remove(i).1,
                    None => Outcome::Failed(format!("{} was not planned", req.name)),
                },
                Decision::Skipped(reason) => Outcome::Skipped(reason),
                Decision::Failed(reason) => Outcome::Failed(reason),
            };
            report.requirements.push((req, outcome));
        }
        report.dependencies = installed;

        if let Some(e) = dependency_error {
            let name = match Error::find(&e) {
                Some(Error::UnmetDependency { requirement, .. }) => requirement.clone(),
                _ => "dependencies".to_string(),
            };
            report.dependencies.push((name, Outcome::Failed(format!("{:#}", e))));
        }
        report
    }

    /// Download `release` into `dest_dir` without touching the mods
    /// directory. Returns `None` when the file exists and `replace` is not
    /// set.
    #[tracing::instrument(skip(self, release), fields(file = %release.file_name))]
    pub async fn fetch(
        &self,
        release: &Release,
        dest_dir: &Path,
        replace: bool,
    ) -> Result<Option<PathBuf>> {
        validate_file_name(&release.file_name)?;

        let dest = dest_dir.join(&release.file_name);
        if self.runtime().exists(&dest) && !replace {
            info!("{} already exists", dest.display());
            return Ok(None);
        }
        self.runtime().create_dir_all(dest_dir)?;
        self.download_to(release, &dest).await?;
        Ok(Some(dest))
    }

    /// Download into the temporary area, verify, then move to `dest`.
    async fn download_to(&self, release: &Release, dest: &Path) -> Result<()> {
        let runtime = self.runtime();
        let tmp_dir = self.write_path.join(TMP_DIR);
        runtime.create_dir_all(&tmp_dir)?;
        let tmp = tmp_dir.join(&release.file_name);

        let guard = self
            .cleanup_ctx
            .as_ref()
            .map(|ctx| CleanupGuard::new(Arc::clone(ctx), tmp.clone()));

        let result = match self.download_with_login(release, &tmp).await {
            Ok(stats) => verify_size(release, &stats).and_then(|()| promote(runtime, &tmp, dest)),
            Err(e) => Err(e),
        };

        if result.is_err() && runtime.exists(&tmp) {
            if let Err(e) = runtime.remove_file(&tmp) {
                warn!("Failed to remove {}: {}", tmp.display(), e);
            }
        }
        if let Some(guard) = guard {
            guard.success();
        }
        result
    }

    /// Download once, logging in again and retrying once if the token is
    /// rejected.
    async fn download_with_login(&self, release: &Release, tmp: &Path) -> Result<DownloadStats> {
        let credentials = self.credentials.credentials(false).await?;
        match self
            .downloader
            .download(&release.download_url, &credentials, tmp)
            .await
        {
            Err(e) if is_forbidden(&e) => {
                eprintln!("Authentication error when downloading mod. Please login again.");
                let credentials = self.credentials.credentials(true).await?;
                self.downloader
                    .download(&release.download_url, &credentials, tmp)
                    .await
                    .with_context(|| format!("Failed to download {}", release.file_name))
            }
            other => other.with_context(|| format!("Failed to download {}", release.file_name)),
        }
    }
}

/// Release file names must be plain `.zip` file names.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.contains(['/', '\\']) || !file_name.ends_with(".zip") || file_name == ".zip" {
        bail!("Invalid mod file name: {:?}", file_name);
    }
    Ok(())
}

/// Compare received bytes with the size the catalog announced, falling back
/// to the server's `Content-Length`.
fn verify_size(release: &Release, stats: &DownloadStats) -> Result<()> {
    match release.file_size.or(stats.content_length) {
        Some(expected) if expected != stats.bytes => Err(Error::CorruptDownload {
            file_name: release.file_name.clone(),
            expected,
            actual: stats.bytes,
        }
        .into()),
        Some(_) => Ok(()),
        None => {
            warn!("No expected size for {}, not verified", release.file_name);
            Ok(())
        }
    }
}

/// Move `from` to `to`, copying when a rename is not possible.
///
/// The copy goes to a staging name beside `to` and is renamed into place,
/// so `to` never holds a partial file.
fn promote<R: Runtime>(runtime: &R, from: &Path, to: &Path) -> Result<()> {
    let Err(e) = runtime.rename(from, to) else {
        return Ok(());
    };
    debug!("Rename failed ({:#}), copying instead", e);

    let staging = staging_path(to)?;
    let staged = runtime
        .copy(from, &staging)
        .and_then(|_| runtime.rename(&staging, to));
    if let Err(e) = staged {
        if runtime.exists(&staging)
            && let Err(cleanup_err) = runtime.remove_file(&staging)
        {
            warn!("Failed to remove {}: {}", staging.display(), cleanup_err);
        }
        return Err(e);
    }
    runtime.remove_file(from)
}

/// `.<file name>.part` in the directory of `path`.
fn staging_path(path: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid destination {}", path.display()))?;
    Ok(path.with_file_name(format!(".{}.part", name.to_string_lossy())))
}

fn is_forbidden(e: &anyhow::Error) -> bool {
    e.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<NonRetryableError>(),
            Some(NonRetryableError::Forbidden(_))
        )
    })
}

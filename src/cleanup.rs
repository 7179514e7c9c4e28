//! Paths to remove if the user interrupts a download or an unpack.

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tracks temporary downloads and partially-unpacked directories.
#[derive(Default)]
pub struct CleanupContext {
    paths: Vec<PathBuf>,
}

impl CleanupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path to be cleaned up on interruption
    pub fn add(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Remove a path from cleanup list once the operation is done with it
    pub fn remove(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Clean up all registered paths
    pub fn cleanup(&self) {
        for path in &self.paths {
            debug!("Cleaning up: {:?}", path);
            let result = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else if path.exists() {
                std::fs::remove_file(path)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                warn!("Failed to clean up {}: {}", path.display(), e);
            }
        }
    }
}

pub type SharedCleanupContext = Arc<Mutex<CleanupContext>>;

pub fn new_shared() -> SharedCleanupContext {
    Arc::new(Mutex::new(CleanupContext::new()))
}

/// Registers a path for the lifetime of an operation.
///
/// Dropping the guard keeps the path registered, so an interrupted or
/// failed operation still gets cleaned up; call [`CleanupGuard::success`]
/// once the path is in its final place or already removed.
pub struct CleanupGuard {
    ctx: SharedCleanupContext,
    path: PathBuf,
}

impl CleanupGuard {
    pub fn new(ctx: SharedCleanupContext, path: PathBuf) -> Self {
        if let Ok(mut guard) = ctx.lock() {
            guard.add(path.clone());
        }
        Self { ctx, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unregister the path.
    pub fn success(self) {
        if let Ok(mut guard) = self.ctx.lock() {
            guard.remove(&self.path);
        }
    }
}

/// Clean up registered paths and exit with status 130 on Ctrl-C.
///
/// Abort the returned handle once the guarded work is finished.
pub fn spawn_interrupt_handler(ctx: SharedCleanupContext) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            if let Ok(guard) = ctx.lock() {
                guard.cleanup();
            }
            std::process::exit(130);
        }
    })
}

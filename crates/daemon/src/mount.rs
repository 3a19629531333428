//! Mount bookkeeping for the drive-polling loop.
//!
//! Disc classification needs the disc mounted long enough to look for the
//! DVD marker directory. All mounts go through one process-wide
//! [`MountManager`] that registers every active mount point; each
//! successful mount is handed back as a [`MountGuard`] that unmounts on
//! drop, and whatever is still registered at process shutdown is flushed by
//! [`MountManager::unmount_all`].

use crate::process::{run_capture, CommandError};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Error type for mount operations
#[derive(Debug, Error)]
pub enum MountError {
    /// Privileged mount command failed
    #[error("mount failed: {0}")]
    Command(#[from] CommandError),

    /// Mount point directory could not be created
    #[error("failed to create mount point {path}: {source}")]
    MountPoint {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The privileged mount/unmount operations, behind a seam so tests can
/// substitute a recording implementation.
pub trait MountOps: Send + Sync {
    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), CommandError>;
    fn unmount(&self, mount_point: &Path) -> Result<(), CommandError>;
}

/// Production implementation shelling out to the privileged helpers.
pub struct SystemMounter;

impl MountOps for SystemMounter {
    fn mount(&self, device: &Path, mount_point: &Path) -> Result<(), CommandError> {
        run_capture(Command::new("sudo").arg("mount").arg(device).arg(mount_point))
            .map(|_| ())
    }

    fn unmount(&self, mount_point: &Path) -> Result<(), CommandError> {
        run_capture(Command::new("sudo").arg("umount").arg(mount_point)).map(|_| ())
    }
}

/// Process-wide registry of active mounts.
pub struct MountManager {
    ops: Arc<dyn MountOps>,
    active: Mutex<Vec<PathBuf>>,
}

impl MountManager {
    pub fn new(ops: Arc<dyn MountOps>) -> Self {
        Self {
            ops,
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemMounter))
    }

    /// Mount `device` at `mount_point`, creating the mount point if absent.
    ///
    /// The mount point is registered only on success; the returned guard
    /// unmounts and deregisters it when dropped.
    pub fn mount(
        self: &Arc<Self>,
        device: &Path,
        mount_point: &Path,
    ) -> Result<MountGuard, MountError> {
        fs::create_dir_all(mount_point).map_err(|source| MountError::MountPoint {
            path: mount_point.to_path_buf(),
            source,
        })?;

        self.ops.mount(device, mount_point)?;

        self.active
            .lock()
            .unwrap()
            .push(mount_point.to_path_buf());
        debug!("Mounted {} at {}", device.display(), mount_point.display());

        Ok(MountGuard {
            manager: Arc::clone(self),
            mount_point: mount_point.to_path_buf(),
        })
    }

    /// Unmount one registered mount point.
    ///
    /// On failure the registration is kept so the exit-time flush can retry.
    fn release(&self, mount_point: &Path) {
        match self.ops.unmount(mount_point) {
            Ok(()) => {
                self.active
                    .lock()
                    .unwrap()
                    .retain(|p| p != mount_point);
                debug!("Unmounted {}", mount_point.display());
            }
            Err(e) => {
                warn!(
                    "Failed to unmount {}, leaving registered for shutdown retry: {}",
                    mount_point.display(),
                    e
                );
            }
        }
    }

    /// Unmount every still-registered mount point.
    ///
    /// Runs once at process shutdown so no mount is leaked across restarts.
    pub fn unmount_all(&self) {
        let mount_points: Vec<PathBuf> = self.active.lock().unwrap().drain(..).collect();
        for mount_point in mount_points {
            if let Err(e) = self.ops.unmount(&mount_point) {
                error!("Failed to unmount {}: {}", mount_point.display(), e);
            }
        }
    }

    /// Currently registered mount points.
    pub fn active_mounts(&self) -> Vec<PathBuf> {
        self.active.lock().unwrap().clone()
    }
}

/// Scoped handle to one active mount; unmounts on drop.
pub struct MountGuard {
    manager: Arc<MountManager>,
    mount_point: PathBuf,
}

impl MountGuard {
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        self.manager.release(&self.mount_point);
    }
}

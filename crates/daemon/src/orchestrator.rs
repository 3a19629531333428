//! Rip orchestrator: the drive-polling half of the pipeline.
//!
//! One orchestrator owns one drive for the process lifetime. Each poll
//! cycle classifies whatever is in the tray, dispatches the matching rip
//! routine and ejects the disc. Cycles are independent: every failure short
//! of a missing probe binary is logged and retried on the next poll.

use crate::classify::{classify_drive, DiscKind};
use crate::mount::MountManager;
use crate::rip::{self, disc_identity, RipError};
use crate::shutdown::StopToken;
use spindle_config::{Config, PathsConfig, RipperConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directory whose presence on a mounted disc marks DVD-video content.
pub const VIDEO_MARKER_DIR: &str = "VIDEO_TS";

/// The drive-polling loop.
pub struct Orchestrator {
    device: PathBuf,
    paths: PathsConfig,
    ripper: RipperConfig,
    skip_eject: bool,
    poll_interval: Duration,
    mounts: Arc<MountManager>,
}

impl Orchestrator {
    pub fn new(config: &Config, mounts: Arc<MountManager>) -> Self {
        Self {
            device: config.drive.device.clone(),
            paths: config.paths.clone(),
            ripper: config.ripper.clone(),
            skip_eject: config.drive.skip_eject,
            poll_interval: Duration::from_secs(config.drive.poll_interval_secs),
            mounts,
        }
    }

    /// Run poll cycles until the stop token fires. The token is observed
    /// only between cycles; an in-flight rip is allowed to finish.
    pub fn run(&self, stop: &StopToken) {
        info!("Watching drive {}", self.device.display());
        while !stop.is_stopped() {
            if let Err(e) = self.run_cycle() {
                warn!("Drive poll cycle failed: {}", e);
            }
            thread::sleep(self.poll_interval);
        }
        info!("Drive loop stopped");
    }

    /// One poll of the drive.
    pub fn run_cycle(&self) -> Result<(), RipError> {
        match classify_drive(&self.device)? {
            DiscKind::NoDisc => {
                debug!("No disc in {}", self.device.display());
                Ok(())
            }
            DiscKind::Audio(table) => {
                info!("Audio disc detected in {}", self.device.display());
                rip::rip_redbook(&self.device, &table, &self.paths)?;
                self.eject_if_enabled();
                Ok(())
            }
            DiscKind::Filesystem(params) => {
                let identity = disc_identity(&params)?;
                self.handle_filesystem_disc(&identity)
            }
        }
    }

    /// Rip a disc that carries a filesystem: DVD if the video marker is
    /// present on the mounted volume, raw image otherwise.
    fn handle_filesystem_disc(&self, identity: &str) -> Result<(), RipError> {
        // Either artifact form means this disc was already processed; skip
        // without touching the mount machinery.
        if self.existing_artifact(identity) {
            info!("Disc {} already processed, skipping", identity);
            self.eject_if_enabled();
            return Ok(());
        }

        let mount_point = self.mount_point();
        let guard = match self.mounts.mount(&self.device, &mount_point) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(
                    "Could not mount {}: {}; retrying next cycle",
                    self.device.display(),
                    e
                );
                return Ok(());
            }
        };

        let is_dvd = guard.mount_point().join(VIDEO_MARKER_DIR).exists();
        let outcome = if is_dvd {
            rip::rip_dvd(&self.device, identity, &self.paths, &self.ripper)
        } else {
            rip::rip_data_disc(&self.device, identity, &self.paths)
        };
        drop(guard);
        outcome?;

        self.eject_if_enabled();
        Ok(())
    }

    /// Has this identity already produced an output artifact, in either its
    /// DVD-directory or raw-image form?
    fn existing_artifact(&self, identity: &str) -> bool {
        self.paths.dvd_output_root.join(identity).exists()
            || self
                .paths
                .iso_output_root
                .join(format!("{}.iso", identity))
                .exists()
    }

    /// Deterministic per-drive mount point under the configured mount root.
    fn mount_point(&self) -> PathBuf {
        let name = self
            .device
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "drive".into());
        self.paths.mount_root.join(name)
    }

    fn eject_if_enabled(&self) {
        if self.skip_eject {
            return;
        }
        if let Err(e) = rip::eject(&self.device) {
            warn!("Eject failed for {}: {}", self.device.display(), e);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountOps;
    use crate::process::CommandError;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingMounter {
        mounts: Mutex<Vec<PathBuf>>,
        fail_mount: bool,
    }

    impl RecordingMounter {
        fn new(fail_mount: bool) -> Arc<Self> {
            Arc::new(Self {
                mounts: Mutex::new(Vec::new()),
                fail_mount,
            })
        }

        fn mount_count(&self) -> usize {
            self.mounts.lock().unwrap().len()
        }
    }

    impl MountOps for RecordingMounter {
        fn mount(&self, _device: &Path, mount_point: &Path) -> Result<(), CommandError> {
            if self.fail_mount {
                return Err(CommandError::ExitStatus {
                    command: "mount".to_string(),
                    code: 32,
                    output: String::new(),
                });
            }
            self.mounts.lock().unwrap().push(mount_point.to_path_buf());
            Ok(())
        }

        fn unmount(&self, _mount_point: &Path) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn test_orchestrator(
        tmp: &TempDir,
        ops: Arc<RecordingMounter>,
    ) -> (Orchestrator, Arc<MountManager>) {
        let mut config = Config::default();
        config.drive.device = PathBuf::from("/dev/sr0");
        config.drive.skip_eject = true; // no external eject in tests
        config.paths = PathsConfig {
            wip_root: tmp.path().join("wip"),
            dvd_output_root: tmp.path().join("dvd"),
            redbook_output_root: tmp.path().join("redbook"),
            iso_output_root: tmp.path().join("iso"),
            mount_root: tmp.path().join("mnt"),
        };
        let mounts = Arc::new(MountManager::new(ops));
        let orchestrator = Orchestrator::new(&config, Arc::clone(&mounts));
        (orchestrator, mounts)
    }

    #[test]
    fn test_existing_dvd_artifact_skips_without_mounting() {
        let tmp = TempDir::new().unwrap();
        let ops = RecordingMounter::new(false);
        let (orchestrator, mounts) = test_orchestrator(&tmp, ops.clone());

        fs::create_dir_all(tmp.path().join("dvd").join("MY_DVD-1234")).unwrap();

        orchestrator.handle_filesystem_disc("MY_DVD-1234").unwrap();

        assert_eq!(ops.mount_count(), 0);
        assert!(mounts.active_mounts().is_empty());
        // No WIP work was staged either
        assert!(!tmp.path().join("wip").exists());
    }

    #[test]
    fn test_existing_iso_artifact_skips_without_mounting() {
        let tmp = TempDir::new().unwrap();
        let ops = RecordingMounter::new(false);
        let (orchestrator, _mounts) = test_orchestrator(&tmp, ops.clone());

        fs::create_dir_all(tmp.path().join("iso")).unwrap();
        fs::write(tmp.path().join("iso").join("DATA-9.iso"), b"x").unwrap();

        orchestrator.handle_filesystem_disc("DATA-9").unwrap();

        assert_eq!(ops.mount_count(), 0);
    }

    #[test]
    fn test_mount_failure_is_not_fatal_to_the_cycle() {
        let tmp = TempDir::new().unwrap();
        let ops = RecordingMounter::new(true);
        let (orchestrator, mounts) = test_orchestrator(&tmp, ops);

        // Fresh disc, mount refused: the cycle ends cleanly for a retry
        assert!(orchestrator.handle_filesystem_disc("NEW_DISC-1").is_ok());
        assert!(mounts.active_mounts().is_empty());
    }

    #[test]
    fn test_mount_point_is_deterministic_per_drive() {
        let tmp = TempDir::new().unwrap();
        let ops = RecordingMounter::new(false);
        let (orchestrator, _mounts) = test_orchestrator(&tmp, ops);

        assert_eq!(orchestrator.device, Path::new("/dev/sr0"));
        assert_eq!(orchestrator.mount_point(), tmp.path().join("mnt").join("sr0"));
        assert_eq!(orchestrator.mount_point(), orchestrator.mount_point());
    }
}

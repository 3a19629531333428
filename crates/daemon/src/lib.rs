//! Spindle
//!
//! Unattended optical-disc ingestion daemon: one loop watches a drive,
//! classifies and rips inserted discs into a work-in-progress tree; a
//! second loop independently transcodes finished rip output. The two loops
//! communicate only through the filesystem.

pub mod blkid;
pub mod classify;
pub mod daemon;
pub mod keys;
pub mod mount;
pub mod orchestrator;
pub mod process;
pub mod rip;
pub mod shutdown;
pub mod stability;
pub mod toc;
pub mod transcode;

pub use spindle_config as config;
pub use spindle_config::Config;

pub use blkid::{parse_blkid, parse_blkid_params, DeviceParams};
pub use classify::{classify_drive, device_params, DiscKind};
pub use daemon::{Daemon, DaemonError};
pub use mount::{MountError, MountGuard, MountManager, MountOps, SystemMounter};
pub use orchestrator::{Orchestrator, VIDEO_MARKER_DIR};
pub use process::{run_capture, run_streaming, CommandError};
pub use rip::{
    build_abcde_command, build_dd_command, build_makemkv_command, disc_identity, drive_index,
    eject, rip_bluray, rip_data_disc, rip_dvd, rip_redbook, RipError, RipOutcome,
};
pub use shutdown::StopToken;
pub use stability::{check_stability, compare_sizes, StabilityResult};
pub use toc::{fingerprint, fingerprint_hex, parse_toc};
pub use transcode::{Converter, FfmpegConverter, FileVerdict, TranscodeError, Watcher};

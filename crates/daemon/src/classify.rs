//! Classifier module for categorizing inserted discs.
//!
//! The drive-polling loop needs to know what kind of disc (if any) is in
//! the tray before it can dispatch a rip. Classification runs the block
//! probe first; an empty or failed block probe falls through to the audio
//! TOC probe, whose exit code distinguishes "no disc at all" from "disc
//! present but audio".

use crate::blkid::{parse_blkid, DeviceParams};
use crate::process::{run_capture, CommandError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Classification of the disc currently in a drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscKind {
    /// Drive is empty (or the disc is unreadable by both probes).
    NoDisc,
    /// Audio (redbook) disc; carries the raw TOC probe output.
    Audio(String),
    /// Disc with a recognizable filesystem; carries the probe attributes
    /// reported for the drive's device.
    Filesystem(DeviceParams),
}

impl std::fmt::Display for DiscKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscKind::NoDisc => write!(f, "no_disc"),
            DiscKind::Audio(_) => write!(f, "audio"),
            DiscKind::Filesystem(_) => write!(f, "filesystem"),
        }
    }
}

/// Pick the probe attributes for one device out of full probe output.
///
/// Empty probe output, or output that does not mention the device, yields
/// `None` — a valid "no recognizable filesystem" result, not an error.
pub fn device_params(device: &Path, blkid_output: &str) -> Option<DeviceParams> {
    let device_key = device.to_string_lossy().into_owned();
    parse_blkid(blkid_output).remove(&device_key)
}

/// Determine what kind of disc is in `device`.
///
/// Probe exit codes are interpreted here, never surfaced: a failed or empty
/// block probe means "try the audio probe", and a failed audio probe means
/// "no disc". Only spawn-level IO failures (tool missing from PATH) are
/// returned as errors.
pub fn classify_drive(device: &Path) -> Result<DiscKind, CommandError> {
    let blkid_output = match run_capture(Command::new("blkid").arg(device)) {
        Ok(output) => output,
        Err(CommandError::ExitStatus { .. }) | Err(CommandError::Terminated { .. }) => {
            String::new()
        }
        Err(e) => return Err(e),
    };

    if let Some(params) = device_params(device, &blkid_output) {
        return Ok(DiscKind::Filesystem(params));
    }

    match run_capture(Command::new("cdparanoia").arg("-d").arg(device).arg("-sQ")) {
        Ok(table) => Ok(DiscKind::Audio(table)),
        Err(CommandError::ExitStatus { .. }) | Err(CommandError::Terminated { .. }) => {
            Ok(DiscKind::NoDisc)
        }
        Err(e) => Err(e),
    }
}

//! Ripping-tool access-key refresh.
//!
//! Key provisioning itself is an external collaborator; this module only
//! invokes the configured updater command against the tool's settings file
//! and reports the outcome. A failed refresh is never fatal — the rip
//! proceeds with whatever key is already installed.

use crate::process::{run_streaming, CommandError};
use std::path::Path;
use std::process::Command;
use tracing::info;

/// External updater expected on the execution path.
pub const KEY_UPDATER: &str = "makemkv-update-key";

/// Refresh the ripping tool's access key in `settings_path`.
pub fn refresh_ripper_key(settings_path: &Path) -> Result<(), CommandError> {
    info!("Refreshing ripper key in {}", settings_path.display());
    run_streaming(Command::new(KEY_UPDATER).arg(settings_path))
}

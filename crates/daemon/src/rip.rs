//! Rip routines for the three disc classes.
//!
//! Each routine is idempotent: it checks the output tree for an artifact of
//! the disc's identity before touching the drive, and reports
//! [`RipOutcome::AlreadyRipped`] instead of re-ripping. DVD output lands in
//! the work-in-progress tree for the transcode watcher to consume; audio
//! and data discs go straight to their output trees.

use crate::blkid::DeviceParams;
use crate::keys;
use crate::process::{run_capture, run_streaming, CommandError};
use crate::toc;
use spindle_config::{PathsConfig, RipperConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{info, warn};

/// Error type for rip operations
#[derive(Debug, Error)]
pub enum RipError {
    /// External tool invocation failed
    #[error("rip command failed: {0}")]
    Command(#[from] CommandError),

    /// Filesystem error preparing or finishing a rip
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Block probe result is missing a key needed to build the identity
    #[error("probe result is missing the {0} attribute")]
    MissingParam(&'static str),

    /// Device path carries no trailing drive index
    #[error("no drive index in device path {0}")]
    DriveIndex(PathBuf),

    /// Audio ripper finished without producing an album directory
    #[error("ripper produced no album directory under {0}")]
    NoAlbumDir(PathBuf),
}

/// Outcome of a rip attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RipOutcome {
    /// External ripper ran and produced output
    Ripped,
    /// An artifact for this identity already exists; nothing was done
    AlreadyRipped,
    /// Disc class is declared but not implemented
    Unsupported,
}

/// Deterministic identity of a filesystem disc: `label-uuid`.
pub fn disc_identity(params: &DeviceParams) -> Result<String, RipError> {
    let label = params
        .get("LABEL")
        .ok_or(RipError::MissingParam("LABEL"))?;
    let uuid = params.get("UUID").ok_or(RipError::MissingParam("UUID"))?;
    Ok(format!("{}-{}", label, uuid))
}

/// Numeric drive index for the full-disc ripper, parsed from the trailing
/// decimal of the device path (`/dev/sr0` -> 0).
pub fn drive_index(device: &Path) -> Result<u32, RipError> {
    let name = device
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| RipError::DriveIndex(device.to_path_buf()))?;

    let digits: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    digits
        .parse()
        .map_err(|_| RipError::DriveIndex(device.to_path_buf()))
}

/// Build the full-disc DVD ripper invocation.
pub fn build_makemkv_command(drive_index: u32, dest: &Path) -> Command {
    let mut cmd = Command::new("makemkvcon");
    cmd.arg("mkv");
    cmd.arg(format!("disc:{}", drive_index));
    cmd.arg("all");
    cmd.arg(dest);
    cmd
}

/// Build the audio-disc ripper invocation. The caller sets the working
/// directory; the ripper creates its album directory relative to it.
pub fn build_abcde_command(device: &Path) -> Command {
    let mut cmd = Command::new("abcde");
    cmd.arg("-d").arg(device);
    cmd.arg("-o").arg("flac");
    cmd.arg("-B");
    cmd.arg("-x");
    cmd.arg("-N");
    cmd
}

/// Build the raw block copy invocation for a data disc.
pub fn build_dd_command(device: &Path, output: &Path) -> Command {
    let mut cmd = Command::new("dd");
    cmd.arg(format!("if={}", device.display()));
    cmd.arg(format!("of={}", output.display()));
    cmd.arg("status=progress");
    cmd
}

/// Build the privileged eject invocation.
pub fn build_eject_command(device: &Path) -> Command {
    let mut cmd = Command::new("sudo");
    cmd.arg("eject");
    cmd.arg("-F");
    cmd.arg(device);
    cmd
}

/// Pop the tray.
pub fn eject(device: &Path) -> Result<(), CommandError> {
    run_capture(&mut build_eject_command(device)).map(|_| ())
}

/// Rip a DVD into the work-in-progress tree for the watcher to consume.
///
/// Clears and recreates `wip/dvd/{identity}`, creates the matching output
/// directory, and runs the full-disc ripper against the drive index with
/// the absolute WIP path as destination. Transcoding is not waited for —
/// ownership of the WIP directory passes to the watcher the moment it
/// exists.
pub fn rip_dvd(
    device: &Path,
    identity: &str,
    paths: &PathsConfig,
    ripper: &RipperConfig,
) -> Result<RipOutcome, RipError> {
    let out_dir = paths.dvd_output_root.join(identity);
    if out_dir.exists() {
        info!("Output path exists: {}", out_dir.display());
        return Ok(RipOutcome::AlreadyRipped);
    }

    if ripper.update_key {
        if let Err(e) = keys::refresh_ripper_key(&ripper.key_settings_path) {
            warn!("Key refresh failed, continuing with installed key: {}", e);
        }
    }

    let wip_dir = paths.wip_root.join("dvd").join(identity);
    if wip_dir.exists() {
        fs::remove_dir_all(&wip_dir)?;
    }
    fs::create_dir_all(&wip_dir)?;
    fs::create_dir_all(&out_dir)?;

    let index = drive_index(device)?;
    let wip_abs = wip_dir.canonicalize()?;

    info!("Ripping DVD {} to {}", identity, wip_abs.display());
    run_streaming(&mut build_makemkv_command(index, &wip_abs))?;
    Ok(RipOutcome::Ripped)
}

/// Rip an audio (redbook) disc.
///
/// The ripper runs with the WIP staging directory as its working directory;
/// the first album directory it leaves behind is moved to the output tree
/// under `{album}-{fingerprint}`.
pub fn rip_redbook(
    device: &Path,
    table: &str,
    paths: &PathsConfig,
) -> Result<RipOutcome, RipError> {
    let lengths = toc::parse_toc(table);
    let fp_hex = toc::fingerprint_hex(&lengths);

    fs::create_dir_all(&paths.redbook_output_root)?;
    if let Some(existing) = find_artifact_with_suffix(&paths.redbook_output_root, &fp_hex)? {
        info!("Audio disc already ripped: {}", existing.display());
        return Ok(RipOutcome::AlreadyRipped);
    }

    let staging = paths.wip_root.join("redbook");
    fs::create_dir_all(&staging)?;

    info!("Ripping audio disc {}", fp_hex);
    run_streaming(build_abcde_command(device).current_dir(&staging))?;

    let album = first_subdirectory(&staging)?
        .ok_or_else(|| RipError::NoAlbumDir(staging.clone()))?;
    let album_name = album
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "album".to_string());

    let dest = paths
        .redbook_output_root
        .join(format!("{}-{}", album_name, fp_hex));
    fs::rename(&album, &dest)?;
    info!("Audio rip finished: {}", dest.display());
    Ok(RipOutcome::Ripped)
}

/// Copy a data disc to a raw image.
///
/// The block copy writes directly to the final output path; the
/// artifact-exists check above makes a re-inserted finished disc a no-op,
/// and an interrupted copy is simply redone on the next insertion.
pub fn rip_data_disc(
    device: &Path,
    identity: &str,
    paths: &PathsConfig,
) -> Result<RipOutcome, RipError> {
    let out_path = paths.iso_output_root.join(format!("{}.iso", identity));
    if out_path.exists() {
        info!("Output path exists: {}", out_path.display());
        return Ok(RipOutcome::AlreadyRipped);
    }

    fs::create_dir_all(&paths.iso_output_root)?;

    info!("Copying data disc to {}", out_path.display());
    run_streaming(&mut build_dd_command(device, &out_path))?;
    Ok(RipOutcome::Ripped)
}

/// Blu-ray ripping is declared but intentionally unimplemented.
pub fn rip_bluray(_params: &DeviceParams) -> Result<RipOutcome, RipError> {
    Ok(RipOutcome::Unsupported)
}

/// First directory entry in `root` whose name ends with `suffix`.
pub fn find_artifact_with_suffix(
    root: &Path,
    suffix: &str,
) -> Result<Option<PathBuf>, std::io::Error> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

fn first_subdirectory(dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::ffi::OsStr;
    use tempfile::TempDir;

    /// Helper to convert Command args to a Vec of strings for easier testing
    fn get_command_args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .filter_map(|arg| arg.to_str().map(String::from))
            .collect()
    }

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn test_paths(tmp: &TempDir) -> PathsConfig {
        PathsConfig {
            wip_root: tmp.path().join("wip"),
            dvd_output_root: tmp.path().join("dvd"),
            redbook_output_root: tmp.path().join("redbook"),
            iso_output_root: tmp.path().join("iso"),
            mount_root: tmp.path().join("mnt"),
        }
    }

    fn params(label: &str, uuid: &str) -> DeviceParams {
        let mut p = DeviceParams::new();
        p.insert("LABEL".to_string(), label.to_string());
        p.insert("UUID".to_string(), uuid.to_string());
        p
    }

    #[test]
    fn test_disc_identity() {
        let id = disc_identity(&params("MY_DVD", "1234-5678")).unwrap();
        assert_eq!(id, "MY_DVD-1234-5678");
    }

    #[test]
    fn test_disc_identity_missing_keys() {
        let mut p = DeviceParams::new();
        p.insert("UUID".to_string(), "1".to_string());
        assert!(matches!(
            disc_identity(&p),
            Err(RipError::MissingParam("LABEL"))
        ));
        assert!(matches!(
            disc_identity(&DeviceParams::new()),
            Err(RipError::MissingParam(_))
        ));
    }

    #[test]
    fn test_drive_index_parsing() {
        assert_eq!(drive_index(Path::new("/dev/sr0")).unwrap(), 0);
        assert_eq!(drive_index(Path::new("/dev/sr12")).unwrap(), 12);
        assert!(drive_index(Path::new("/dev/cdrom")).is_err());
    }

    #[test]
    fn test_makemkv_command_shape() {
        let cmd = build_makemkv_command(1, Path::new("/srv/wip/dvd/X-1"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("makemkvcon"));
        assert_eq!(args[0], "mkv");
        assert_eq!(args[1], "disc:1");
        assert_eq!(args[2], "all");
        assert_eq!(args[3], "/srv/wip/dvd/X-1");
    }

    #[test]
    fn test_abcde_command_shape() {
        let cmd = build_abcde_command(Path::new("/dev/sr0"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("abcde"));
        assert!(has_flag_with_value(&args, "-d", "/dev/sr0"));
        assert!(has_flag_with_value(&args, "-o", "flac"));
        assert!(args.contains(&"-B".to_string()));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"-N".to_string()));
    }

    #[test]
    fn test_dd_command_shape() {
        let cmd = build_dd_command(Path::new("/dev/sr0"), Path::new("/srv/iso/X-1.iso"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("dd"));
        assert!(args.contains(&"if=/dev/sr0".to_string()));
        assert!(args.contains(&"of=/srv/iso/X-1.iso".to_string()));
        assert!(args.contains(&"status=progress".to_string()));
    }

    #[test]
    fn test_eject_command_is_privileged() {
        let cmd = build_eject_command(Path::new("/dev/sr0"));
        let args = get_command_args(&cmd);

        assert_eq!(cmd.get_program(), OsStr::new("sudo"));
        assert_eq!(args, vec!["eject", "-F", "/dev/sr0"]);
    }

    #[test]
    fn test_rip_dvd_skips_existing_output() {
        let tmp = TempDir::new().unwrap();
        let paths = test_paths(&tmp);
        let out_dir = paths.dvd_output_root.join("MY_DVD-1234");
        fs::create_dir_all(&out_dir).unwrap();

        let outcome = rip_dvd(
            Path::new("/dev/sr0"),
            "MY_DVD-1234",
            &paths,
            &RipperConfig::default(),
        )
        .unwrap();

        assert_eq!(outcome, RipOutcome::AlreadyRipped);
        // No WIP directory is created for a skipped disc
        assert!(!paths.wip_root.join("dvd").join("MY_DVD-1234").exists());
    }

    #[test]
    fn test_rip_data_disc_skips_existing_image() {
        let tmp = TempDir::new().unwrap();
        let paths = test_paths(&tmp);
        fs::create_dir_all(&paths.iso_output_root).unwrap();
        fs::write(paths.iso_output_root.join("DATA-9.iso"), b"image").unwrap();

        let outcome =
            rip_data_disc(Path::new("/dev/sr0"), "DATA-9", &paths).unwrap();
        assert_eq!(outcome, RipOutcome::AlreadyRipped);
    }

    #[test]
    fn test_rip_redbook_skips_on_fingerprint_suffix() {
        let tmp = TempDir::new().unwrap();
        let paths = test_paths(&tmp);

        let table = String::new(); // no parseable tracks
        let fp_hex = toc::fingerprint_hex(&toc::parse_toc(&table));
        fs::create_dir_all(&paths.redbook_output_root).unwrap();
        fs::create_dir_all(
            paths
                .redbook_output_root
                .join(format!("Some Album-{}", fp_hex)),
        )
        .unwrap();

        let outcome = rip_redbook(Path::new("/dev/sr0"), &table, &paths).unwrap();
        assert_eq!(outcome, RipOutcome::AlreadyRipped);
        // Staging area untouched on a skip
        assert!(!paths.wip_root.join("redbook").exists());
    }

    #[test]
    fn test_find_artifact_with_suffix() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("Album One-abc123")).unwrap();
        fs::create_dir_all(tmp.path().join("Album Two-def456")).unwrap();

        let found = find_artifact_with_suffix(tmp.path(), "def456").unwrap();
        assert_eq!(
            found.unwrap().file_name().unwrap().to_str().unwrap(),
            "Album Two-def456"
        );
        assert!(find_artifact_with_suffix(tmp.path(), "zzz")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rip_bluray_is_a_no_op() {
        let outcome = rip_bluray(&params("BD", "1")).unwrap();
        assert_eq!(outcome, RipOutcome::Unsupported);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // *For any* drive index and destination, the ripper command carries
        // the full argument set in order.
        #[test]
        fn prop_makemkv_command_completeness(
            index in 0u32..64,
            dest in "[a-zA-Z0-9_/.-]{1,40}",
        ) {
            let cmd = build_makemkv_command(index, Path::new(&dest));
            let args = get_command_args(&cmd);

            prop_assert_eq!(cmd.get_program(), OsStr::new("makemkvcon"));
            prop_assert_eq!(args.len(), 4);
            prop_assert_eq!(&args[0], "mkv");
            prop_assert_eq!(args[1].clone(), format!("disc:{}", index));
            prop_assert_eq!(&args[2], "all");
            prop_assert_eq!(args[3].clone(), dest);
        }

        // Trailing digits of the device name are the drive index.
        #[test]
        fn prop_drive_index_round_trip(index in 0u32..1000) {
            let device = PathBuf::from(format!("/dev/sr{}", index));
            prop_assert_eq!(drive_index(&device).unwrap(), index);
        }
    }
}

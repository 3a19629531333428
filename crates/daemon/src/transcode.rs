//! Transcode watcher: the directory-polling half of the pipeline.
//!
//! On its own schedule, independent of the ripping loop, the watcher scans
//! the DVD work-in-progress tree for rip output that has stopped growing,
//! converts each stable file into the output tree and deletes the consumed
//! source. The filesystem is the only channel between the two loops: a
//! disc directory appearing under the WIP root is the handoff.

use crate::process::{run_streaming, CommandError};
use crate::shutdown::StopToken;
use crate::stability::{check_stability, StabilityResult};
use spindle_config::{PathsConfig, TranscodeConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Error type for a single conversion attempt
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// Transcoder invocation failed
    #[error("transcode command failed: {0}")]
    Command(#[from] CommandError),

    /// Filesystem error reading, staging or deleting a file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The transcoder, behind a seam so tests can substitute a recording
/// implementation.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CommandError>;
}

/// ffmpeg-backed converter with a configurable encoding-argument template.
pub struct FfmpegConverter {
    args: Vec<String>,
}

impl FfmpegConverter {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    /// Build the transcoder invocation: the template sits between the input
    /// and output paths.
    pub fn build_command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y");
        cmd.arg("-i").arg(input);
        cmd.args(&self.args);
        cmd.arg(output);
        cmd
    }
}

impl Converter for FfmpegConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), CommandError> {
        run_streaming(&mut self.build_command(input, output))
    }
}

/// Why a file was, or was not, consumed this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileVerdict {
    /// Below the minimum size; not yet meaningful rip output.
    TooSmall { size: u64 },
    /// Size changed across the settle window; the ripper is still writing.
    StillWriting { initial_size: u64, current_size: u64 },
    /// Converted and the source deleted.
    Converted { output: PathBuf },
}

/// The directory-polling loop.
pub struct Watcher<C: Converter> {
    wip_dvd_root: PathBuf,
    output_root: PathBuf,
    settle: Duration,
    min_file_bytes: u64,
    converter: C,
}

impl<C: Converter> Watcher<C> {
    pub fn new(paths: &PathsConfig, transcode: &TranscodeConfig, converter: C) -> Self {
        Self {
            wip_dvd_root: paths.wip_root.join("dvd"),
            output_root: paths.dvd_output_root.clone(),
            settle: Duration::from_secs(transcode.settle_secs),
            min_file_bytes: transcode.min_file_bytes,
            converter,
        }
    }

    /// Run scan cycles until the stop token fires, sleeping `interval`
    /// between cycles. The token is observed only between cycles.
    pub fn run(&self, stop: &StopToken, interval: Duration) {
        info!("Watching {} for rip output", self.wip_dvd_root.display());
        while !stop.is_stopped() {
            self.run_cycle();
            thread::sleep(interval);
        }
        info!("Transcode watcher stopped");
    }

    /// One scan over the WIP tree. Never fails; per-disc and per-file
    /// problems are logged and left for the next cycle.
    pub fn run_cycle(&self) {
        if !self.wip_dvd_root.exists() {
            debug!("WIP root {} does not exist yet", self.wip_dvd_root.display());
            return;
        }

        for disc_dir in subdirectories(&self.wip_dvd_root) {
            self.process_disc(&disc_dir);
        }
    }

    /// Attempt every file in one disc's WIP directory. A failure on one
    /// file never prevents attempting its siblings — the ripper may simply
    /// still be active in there.
    fn process_disc(&self, disc_dir: &Path) {
        let disc_name = match disc_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => return,
        };

        for file in files_in(disc_dir) {
            match self.try_convert(&disc_name, &file) {
                Ok(FileVerdict::Converted { output }) => {
                    info!("Converted {} -> {}", file.display(), output.display());
                }
                Ok(FileVerdict::TooSmall { size }) => {
                    debug!("Skipping {} ({} bytes, below minimum)", file.display(), size);
                }
                Ok(FileVerdict::StillWriting { initial_size, current_size }) => {
                    debug!(
                        "{} still growing ({} -> {} bytes), retrying next cycle",
                        file.display(),
                        initial_size,
                        current_size
                    );
                }
                Err(e) => {
                    warn!(
                        "Conversion attempt failed for {} (ripper may still be active): {}",
                        file.display(),
                        e
                    );
                }
            }
        }
    }

    /// Gate one file through the size and stability checks, then convert
    /// it and delete the source.
    fn try_convert(&self, disc_name: &str, input: &Path) -> Result<FileVerdict, TranscodeError> {
        let size = fs::metadata(input)?.len();
        if size < self.min_file_bytes {
            return Ok(FileVerdict::TooSmall { size });
        }

        match check_stability(input, size, self.settle)? {
            StabilityResult::Unstable { initial_size, current_size } => {
                Ok(FileVerdict::StillWriting { initial_size, current_size })
            }
            StabilityResult::Stable => {
                let out_dir = self.output_root.join(disc_name);
                fs::create_dir_all(&out_dir)?;
                let output = out_dir.join(output_name(input));

                self.converter.convert(input, &output)?;
                fs::remove_file(input)?;
                Ok(FileVerdict::Converted { output })
            }
        }
    }
}

/// Fixed-container output name for a rip title: `{stem}.mkv`.
fn output_name(input: &Path) -> PathBuf {
    match input.file_stem() {
        Some(stem) => PathBuf::from(stem).with_extension("mkv"),
        None => PathBuf::from("title.mkv"),
    }
}

/// Immediate subdirectories of `root`. The per-disc directories themselves
/// are never deleted; empty leftovers are an accepted byproduct.
fn subdirectories(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.path().to_path_buf())
        .collect()
}

/// Immediate files of `dir`.
fn files_in(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect()
}

//! CLI entry point for the spindle disc-ripping daemon
//!
//! Parses command line arguments, layers them over the configuration file
//! and starts the daemon. Explicitly supplied flags always win over file
//! values.

use clap::Parser;
use spindle::{Config, Daemon};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Unattended optical-disc ripping and transcoding daemon
#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Optical drive device path
    #[arg(long)]
    drive: Option<PathBuf>,

    /// Work-in-progress tree root
    #[arg(long)]
    wip_root: Option<PathBuf>,

    /// Finished DVD output root
    #[arg(long)]
    dvd_root: Option<PathBuf>,

    /// Finished audio (redbook) output root
    #[arg(long)]
    redbook_root: Option<PathBuf>,

    /// Finished data-disc image output root
    #[arg(long)]
    iso_root: Option<PathBuf>,

    /// Leave discs in the tray after ripping
    #[arg(long, default_value = "false")]
    no_eject: bool,

    /// Refresh the ripping tool's access key before each DVD rip
    #[arg(long, default_value = "false")]
    update_key: bool,

    /// Settings file the key updater writes into
    #[arg(long)]
    key_settings: Option<PathBuf>,

    /// Verbose (debug) logging
    #[arg(long, default_value = "false")]
    debug: bool,
}

/// Layer explicitly supplied flags over the loaded configuration.
fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(drive) = &args.drive {
        config.drive.device = drive.clone();
    }
    if let Some(wip_root) = &args.wip_root {
        config.paths.wip_root = wip_root.clone();
    }
    if let Some(dvd_root) = &args.dvd_root {
        config.paths.dvd_output_root = dvd_root.clone();
    }
    if let Some(redbook_root) = &args.redbook_root {
        config.paths.redbook_output_root = redbook_root.clone();
    }
    if let Some(iso_root) = &args.iso_root {
        config.paths.iso_output_root = iso_root.clone();
    }
    if args.no_eject {
        config.drive.skip_eject = true;
    }
    if args.update_key {
        config.ripper.update_key = true;
    }
    if let Some(key_settings) = &args.key_settings {
        config.ripper.key_settings_path = key_settings.clone();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // A missing config file is not an error; defaults cover everything.
    let mut config = if args.config.exists() {
        match Config::load(&args.config) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };
    apply_cli_overrides(&mut config, &args);

    info!("Watching drive {}", config.drive.device.display());
    info!("WIP tree: {}", config.paths.wip_root.display());
    info!(
        "Output roots: dvd={} redbook={} iso={}",
        config.paths.dvd_output_root.display(),
        config.paths.redbook_output_root.display(),
        config.paths.iso_output_root.display()
    );

    let daemon = Daemon::new(config);
    match daemon.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Daemon error: {}", e);
            ExitCode::FAILURE
        }
    }
}

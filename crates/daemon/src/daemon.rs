//! Daemon startup and loop supervision for spindle
//!
//! Wires the two polling loops together, owns the shared stop token and
//! mount registry, and guarantees mount cleanup at shutdown.

use crate::mount::{MountManager, MountOps};
use crate::orchestrator::Orchestrator;
use crate::shutdown::StopToken;
use crate::transcode::{FfmpegConverter, Watcher};
use spindle_config::{Config, ConfigError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Loop supervision error
    #[error("Task error: {0}")]
    Task(String),
}

/// Daemon state containing all runtime components
pub struct Daemon {
    /// Configuration loaded from file, environment and CLI overrides
    pub config: Config,
    /// Process-wide mount registry shared with the orchestrator
    mounts: Arc<MountManager>,
    /// Cooperative stop signal observed by both loops
    stop: StopToken,
}

impl Daemon {
    /// Initialize the daemon with the privileged system mounter.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mounts: Arc::new(MountManager::system()),
            stop: StopToken::new(),
        }
    }

    /// Initialize the daemon with a custom mount implementation.
    ///
    /// Useful for testing when the privileged mount helpers are not
    /// available.
    pub fn with_mounter(config: Config, ops: Arc<dyn MountOps>) -> Self {
        Self {
            config,
            mounts: Arc::new(MountManager::new(ops)),
            stop: StopToken::new(),
        }
    }

    /// A clone of the stop token, for requesting shutdown externally.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Spawn the two polling loops on dedicated blocking tasks.
    ///
    /// The loops share no in-memory state beyond the stop token and the
    /// mount registry; everything else flows through the filesystem.
    pub fn spawn_loops(
        &self,
    ) -> (
        tokio::task::JoinHandle<()>,
        tokio::task::JoinHandle<()>,
    ) {
        let orchestrator = Orchestrator::new(&self.config, Arc::clone(&self.mounts));
        let stop = self.stop.clone();
        let rip_handle = tokio::task::spawn_blocking(move || orchestrator.run(&stop));

        let watcher = Watcher::new(
            &self.config.paths,
            &self.config.transcode,
            FfmpegConverter::new(self.config.transcode.ffmpeg_args.clone()),
        );
        let stop = self.stop.clone();
        let interval = Duration::from_secs(self.config.transcode.poll_interval_secs);
        let watch_handle = tokio::task::spawn_blocking(move || watcher.run(&stop, interval));

        (rip_handle, watch_handle)
    }

    /// Wait for both loops to finish their in-flight cycles, then flush the
    /// mount registry. There is no hard-kill path: a blocking external-tool
    /// call is always allowed to complete.
    pub async fn join_and_cleanup(
        &self,
        handles: (
            tokio::task::JoinHandle<()>,
            tokio::task::JoinHandle<()>,
        ),
    ) -> Result<(), DaemonError> {
        let (rip_handle, watch_handle) = handles;
        if let Err(e) = rip_handle.await {
            error!("Drive loop task failed: {}", e);
        }
        if let Err(e) = watch_handle.await {
            error!("Watcher task failed: {}", e);
        }

        self.mounts.unmount_all();
        Ok(())
    }

    /// Run the daemon until a shutdown signal arrives.
    ///
    /// Ctrl-C is a normal shutdown request: both loops exit at their next
    /// cycle boundary and every registered mount is released before this
    /// returns.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let handles = self.spawn_loops();

        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
        self.stop.stop();

        self.join_and_cleanup(handles).await
    }
}

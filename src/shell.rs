//! Headless application shell.
//!
//! Wires the settings store, the rclone runner and the mount manager
//! together, runs the startup sequence, and unmounts within a bounded
//! time on Ctrl-C.

use crate::logging;
use mdeck_mount::mount::{
    detect_filesystem_driver, MountError, MountManager, MountManagerState, MountStatus,
    RcloneRunner, SystemDrives, SystemProcessTable,
};
use mdeck_settings::settings::{
    SettingsError, SettingsPaths, SettingsProvider, SettingsStore, SettingsStoreState,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Long-lived services of one running instance.
pub struct App {
    pub settings: SettingsStoreState,
    pub rclone: Arc<RcloneRunner>,
    pub mounts: MountManagerState,
}

impl App {
    /// Open settings rooted at `paths`, locate rclone and build the mount
    /// manager. Nothing is mounted yet.
    pub async fn start(paths: SettingsPaths) -> AppResult<Self> {
        let settings = SettingsStore::open(paths).await?;
        info!("Settings loaded from {}", settings.paths().settings_file.display());

        let custom = settings.custom_rclone_path().await;
        let binary = RcloneRunner::locate(custom.as_deref())?;
        info!("Using rclone at {}", binary.display());

        let rclone = Arc::new(
            RcloneRunner::new(binary)
                .with_config_file(settings.paths().rclone_config.clone())
                .with_cache_dir(settings.cache_dir().await),
        );
        let probe = Arc::new(SystemDrives::new(settings.paths().data_dir.join("mnt")));
        let mounts = MountManager::builder(settings.clone(), probe)
            .rclone(rclone.clone(), Arc::new(SystemProcessTable))
            .build();

        Ok(Self {
            settings,
            rclone,
            mounts,
        })
    }

    /// Log the rclone version and warn when no filesystem driver is
    /// installed. Never fails.
    pub async fn preflight(&self) {
        match self.rclone.version().await {
            Ok(v) => info!("{}", v),
            Err(e) => warn!("Could not query rclone version: {}", e),
        }

        let driver = detect_filesystem_driver();
        if driver.installed {
            info!("{} found at {}", driver.name, driver.detail);
        } else {
            match &driver.download_url {
                Some(url) => warn!("{}: {} (download: {})", driver.name, driver.detail, url),
                None => warn!("{}: {}", driver.name, driver.detail),
            }
        }
    }

    /// Log every status transition until the manager goes away.
    pub fn spawn_event_log(&self) -> JoinHandle<()> {
        let mut rx = self.mounts.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) if ev.new_status == MountStatus::Error => error!(
                        connection = %ev.connection_id,
                        "{} -> {}: {}",
                        ev.old_status,
                        ev.new_status,
                        ev.error_message.as_deref().unwrap_or("unknown error")
                    ),
                    Ok(ev) => info!(
                        connection = %ev.connection_id,
                        "{} -> {}{}",
                        ev.old_status,
                        ev.new_status,
                        ev.drive_letter.map(|l| format!(" ({}:)", l)).unwrap_or_default()
                    ),
                    Err(RecvError::Lagged(n)) => warn!("Event log skipped {} events", n),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Bounded unmount of everything (when enabled in settings).
    pub async fn shutdown(&self) -> bool {
        let timeout = self.mounts.timings().shutdown_timeout;
        self.mounts.shutdown(timeout).await
    }
}

/// Entry point used by the binary.
pub async fn run() -> AppResult<()> {
    logging::init();
    info!("MountDeck {} starting", env!("CARGO_PKG_VERSION"));

    let app = App::start(SettingsPaths::from_env()?).await?;
    app.preflight().await;
    let events = app.spawn_event_log();

    let drives = app.mounts.auto_mount().await;
    let ok = drives
        .iter()
        .filter(|d| d.status == MountStatus::Mounted)
        .count();
    if !drives.is_empty() {
        info!("Auto-mounted {} of {} drive(s)", ok, drives.len());
    }

    tokio::signal::ctrl_c().await.map_err(AppError::Signal)?;
    info!("Shutting down");
    if !app.shutdown().await {
        warn!("Some drives may still be mounted");
    }
    events.abort();
    Ok(())
}

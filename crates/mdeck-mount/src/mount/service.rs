//! Mount manager – the engine's public façade.
//!
//! Resolves letters, drives the per-connection state machine through the
//! registry, calls the protocol adapters, starts exit supervision and
//! forwards user notifications. Failures after the precondition checks
//! never escape as errors: they become `Error` entries with `last_error`.

use crate::mount::adapter::{MountAdapter, MountDriver};
use crate::mount::error::{MountError, MountResult};
use crate::mount::ftp::FtpAdapter;
use crate::mount::letters::{available_letters, DriveProbe};
use crate::mount::notify::{LogNotifier, Notifier};
use crate::mount::process::ProcessTable;
use crate::mount::rclone::RcloneRunner;
use crate::mount::registry::MountRegistry;
use crate::mount::sftp::SftpAdapter;
use crate::mount::supervisor;
use crate::mount::types::{MountStatus, MountStatusChanged, MountTimings, MountedDrive};
use log::{debug, error, info, warn};
use mdeck_settings::settings::{Connection, DriveLetter, Protocol, SettingsProvider};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Shared handle held by the application shell.
pub type MountManagerState = Arc<MountManager>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Builder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MountManagerBuilder {
    settings: Arc<dyn SettingsProvider>,
    probe: Arc<dyn DriveProbe>,
    adapters: HashMap<Protocol, Arc<dyn MountAdapter>>,
    rclone: Option<(Arc<RcloneRunner>, Arc<dyn ProcessTable>)>,
    notifier: Arc<dyn Notifier>,
    timings: MountTimings,
}

impl MountManagerBuilder {
    pub fn new(settings: Arc<dyn SettingsProvider>, probe: Arc<dyn DriveProbe>) -> Self {
        Self {
            settings,
            probe,
            adapters: HashMap::new(),
            rclone: None,
            notifier: Arc::new(LogNotifier),
            timings: MountTimings::default(),
        }
    }

    /// Register an adapter, replacing any previous one for its protocol.
    pub fn adapter(mut self, adapter: Arc<dyn MountAdapter>) -> Self {
        self.adapters.insert(adapter.protocol(), adapter);
        self
    }

    /// Use the rclone-backed SFTP and FTP adapters for every protocol not
    /// given an explicit adapter.
    pub fn rclone(mut self, runner: Arc<RcloneRunner>, processes: Arc<dyn ProcessTable>) -> Self {
        self.rclone = Some((runner, processes));
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn timings(mut self, timings: MountTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn build(mut self) -> MountManagerState {
        if let Some((runner, processes)) = self.rclone.take() {
            let driver = Arc::new(MountDriver::new(
                runner,
                self.probe.clone(),
                processes,
                self.timings,
            ));
            let builtin: [Arc<dyn MountAdapter>; 2] = [
                Arc::new(SftpAdapter::new(driver.clone())),
                Arc::new(FtpAdapter::new(driver)),
            ];
            for adapter in builtin {
                self.adapters.entry(adapter.protocol()).or_insert(adapter);
            }
        }

        Arc::new(MountManager {
            registry: Arc::new(MountRegistry::new()),
            settings: self.settings,
            probe: self.probe,
            adapters: self.adapters,
            notifier: self.notifier,
            timings: self.timings,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MountManager {
    registry: Arc<MountRegistry>,
    settings: Arc<dyn SettingsProvider>,
    probe: Arc<dyn DriveProbe>,
    adapters: HashMap<Protocol, Arc<dyn MountAdapter>>,
    notifier: Arc<dyn Notifier>,
    timings: MountTimings,
}

impl MountManager {
    pub fn builder(
        settings: Arc<dyn SettingsProvider>,
        probe: Arc<dyn DriveProbe>,
    ) -> MountManagerBuilder {
        MountManagerBuilder::new(settings, probe)
    }

    pub fn timings(&self) -> &MountTimings {
        &self.timings
    }

    fn adapter(&self, protocol: Protocol) -> MountResult<&Arc<dyn MountAdapter>> {
        self.adapters
            .get(&protocol)
            .ok_or(MountError::AdapterMissing(protocol))
    }

    async fn notifications(&self) -> bool {
        self.settings.notifications_enabled().await
    }

    // ── Mount ───────────────────────────────────────────────────────

    /// Mount `connection`.
    ///
    /// Letter precedence: `preferred`, then the connection's stored
    /// letter, then the first free letter from Z down. Returns `Err` only
    /// for precondition failures (no adapter, no letter, letter taken,
    /// operation already running, already mounted); a failed launch
    /// returns the `Error` snapshot.
    pub async fn mount(
        &self,
        connection: &Connection,
        preferred: Option<DriveLetter>,
    ) -> MountResult<MountedDrive> {
        let adapter = self.adapter(connection.protocol())?.clone();
        let requested = preferred.or_else(|| connection.mount_settings().preferred_letter());
        let system_used = self.probe.used_letters().await;

        let ticket = self
            .registry
            .begin_mount(connection, requested, &system_used)
            .await?;
        let id = connection.id();
        info!(
            "Mounting {} '{}' at {}:",
            connection.protocol(),
            connection.name(),
            ticket.letter
        );

        let global = self.settings.global_defaults().await;
        let vfs = connection.mount_settings().effective_vfs(&global);

        match adapter.mount(connection, ticket.letter, &vfs).await {
            Ok(process) => {
                let process = Arc::new(process);
                let Some(drive) = self
                    .registry
                    .finish_mount(id, ticket.generation, Ok(process.clone()))
                    .await
                else {
                    process.kill();
                    return Err(MountError::LaunchFailed(format!(
                        "mount entry for {} was replaced",
                        id
                    )));
                };
                supervisor::watch(&self.registry, id.to_string(), ticket.generation, process);
                info!("'{}' mounted at {}", connection.name(), drive.mount_path());
                if self.notifications().await {
                    self.notifier.notify_mounted(connection.name(), ticket.letter);
                }
                Ok(drive)
            }
            Err(e) => {
                let message = e.to_string();
                error!("Mount of '{}' failed: {}", connection.name(), message);
                let drive = self
                    .registry
                    .finish_mount(id, ticket.generation, Err(message.clone()))
                    .await
                    .ok_or_else(|| MountError::LaunchFailed(message.clone()))?;
                if self.notifications().await {
                    self.notifier.notify_mount_error(connection.name(), &message);
                }
                Ok(drive)
            }
        }
    }

    /// Track a drive already mounted at `letter` outside this manager.
    /// It is torn down by letter through the protocol adapter.
    pub async fn adopt(&self, connection: &Connection, letter: DriveLetter) -> MountResult<MountedDrive> {
        self.adapter(connection.protocol())?;
        let drive = self.registry.adopt(connection, letter).await?;
        info!("Adopted existing mount of '{}' at {}:", connection.name(), letter);
        Ok(drive)
    }

    // ── Unmount ─────────────────────────────────────────────────────

    /// Unmount `connection_id`. `false` when there is no entry, another
    /// operation for it is running, or teardown failed.
    pub async fn unmount(&self, connection_id: &str) -> bool {
        let Some(ticket) = self.registry.begin_unmount(connection_id).await else {
            debug!("Unmount of {} skipped: no idle entry", connection_id);
            return false;
        };
        let drive = &ticket.drive;
        let letter = drive.drive_letter;

        let outcome: Result<(), String> = match &ticket.process {
            Some(process) => {
                if !process.kill_and_wait(self.timings.stop_grace).await {
                    warn!(
                        "rclone (pid {:?}) for {} did not exit within {:?}, continuing",
                        process.pid(),
                        connection_id,
                        self.timings.stop_grace
                    );
                }
                Ok(())
            }
            None if !ticket.adopted || ticket.letter_shared => {
                debug!(
                    "No process for {} at {}:, nothing to tear down",
                    connection_id, letter
                );
                Ok(())
            }
            None => match self.adapter(drive.protocol) {
                Ok(adapter) => match adapter.unmount(letter).await {
                    Ok(found) => {
                        if !found {
                            debug!("No mount process found for {}:", letter);
                        }
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            },
        };

        match outcome {
            Ok(()) => {
                self.registry
                    .finish_unmount(connection_id, ticket.generation, Ok(()))
                    .await;
                info!("'{}' unmounted from {}:", drive.connection_name, letter);
                if self.notifications().await {
                    self.notifier.notify_unmounted(&drive.connection_name, letter);
                }
                true
            }
            Err(message) => {
                error!("Unmount of '{}' failed: {}", drive.connection_name, message);
                self.registry
                    .finish_unmount(connection_id, ticket.generation, Err(message))
                    .await;
                false
            }
        }
    }

    /// Unmount every entry, one after another. Returns the ids that were
    /// unmounted.
    pub async fn unmount_all(&self) -> Vec<String> {
        let mut ids = self.registry.ids().await;
        ids.sort();

        let mut unmounted = Vec::new();
        for id in &ids {
            if self.unmount(id).await {
                unmounted.push(id.clone());
            } else {
                warn!("Could not unmount {}", id);
            }
        }
        unmounted
    }

    /// Mount every connection flagged for auto-mount, when enabled.
    /// Per-connection failures are logged and skipped.
    pub async fn auto_mount(&self) -> Vec<MountedDrive> {
        if !self.settings.auto_mount_enabled().await {
            debug!("Auto-mount disabled");
            return Vec::new();
        }

        let mut drives = Vec::new();
        for protocol in Protocol::ALL {
            for connection in self.settings.list_connections(protocol).await {
                if !connection.auto_mount() {
                    continue;
                }
                match self.mount(&connection, None).await {
                    Ok(drive) => drives.push(drive),
                    Err(e) => warn!("Auto-mount of '{}' skipped: {}", connection.name(), e),
                }
            }
        }
        info!("Auto-mount processed {} connection(s)", drives.len());
        drives
    }

    /// Unmount everything if unmount-on-close is enabled, giving up after
    /// `timeout`. `false` when the deadline passed first.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        if !self.settings.unmount_on_close_enabled().await {
            info!("Unmount on close disabled, leaving drives mounted");
            return true;
        }
        match tokio::time::timeout(timeout, self.unmount_all()).await {
            Ok(ids) => {
                info!("Shutdown unmounted {} drive(s)", ids.len());
                true
            }
            Err(_) => {
                warn!("Shutdown unmount did not finish within {:?}, abandoning", timeout);
                false
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_status(&self, connection_id: &str) -> Option<MountedDrive> {
        self.registry.get(connection_id).await
    }

    pub async fn is_mounted(&self, connection_id: &str) -> bool {
        matches!(
            self.registry.get(connection_id).await,
            Some(MountedDrive {
                status: MountStatus::Mounted,
                ..
            })
        )
    }

    pub async fn list_mounts(&self) -> Vec<MountedDrive> {
        self.registry.list().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MountStatusChanged> {
        self.registry.subscribe()
    }

    /// Letters free on the system and not reserved by any live entry.
    pub async fn available_letters(&self) -> Vec<DriveLetter> {
        let mut used = self.probe.used_letters().await;
        used.extend(self.registry.held_letters().await);
        available_letters(&used)
    }

    // ── Remote definitions ──────────────────────────────────────────

    pub async fn create_remote(&self, connection: &Connection) -> MountResult<()> {
        self.adapter(connection.protocol())?
            .ensure_remote(connection)
            .await
    }

    pub async fn delete_remote(&self, connection: &Connection) -> MountResult<()> {
        self.adapter(connection.protocol())?
            .delete_remote(connection)
            .await
    }

    pub async fn test_connection(&self, connection: &Connection) -> MountResult<String> {
        self.adapter(connection.protocol())?
            .test_connection(connection)
            .await
    }
}

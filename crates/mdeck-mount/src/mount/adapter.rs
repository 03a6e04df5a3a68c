//! Protocol adapter seam and the launch / readiness driver shared by all
//! rclone-backed adapters.

use crate::mount::args::{build_mount_args, remote_spec, MountRequest};
use crate::mount::error::{MountError, MountResult};
use crate::mount::letters::DriveProbe;
use crate::mount::process::{targets_mount_point, ProcessHandle, ProcessTable};
use crate::mount::rclone::RcloneRunner;
use crate::mount::types::MountTimings;
use log::{info, warn};
use mdeck_settings::settings::{Connection, DriveLetter, Protocol, VfsOptions};
use std::sync::Arc;
use std::time::Duration;

/// Message returned by a successful reachability test.
pub const CONNECTION_OK: &str = "Connection successful!";

/// One remote protocol. Implementations turn a connection record into a
/// running mount process and know how to tear a letter down without one.
#[async_trait::async_trait]
pub trait MountAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Create or replace the remote definition for `connection`.
    async fn ensure_remote(&self, connection: &Connection) -> MountResult<()>;

    async fn delete_remote(&self, connection: &Connection) -> MountResult<()>;

    /// Check the remote can be listed. Returns a user-facing message.
    async fn test_connection(&self, connection: &Connection) -> MountResult<String>;

    /// Mount `connection` at `letter` and wait until it is reachable.
    /// On failure no process is left running.
    async fn mount(
        &self,
        connection: &Connection,
        letter: DriveLetter,
        vfs: &VfsOptions,
    ) -> MountResult<ProcessHandle>;

    /// Unmount `letter` when no process handle is held, by finding the
    /// mount process and terminating it. `Ok(false)` when none was found.
    async fn unmount(&self, letter: DriveLetter) -> MountResult<bool>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Launches `rclone mount`, waits for the drive and finds stray mounts.
pub struct MountDriver {
    runner: Arc<RcloneRunner>,
    probe: Arc<dyn DriveProbe>,
    processes: Arc<dyn ProcessTable>,
    timings: MountTimings,
}

impl MountDriver {
    pub fn new(
        runner: Arc<RcloneRunner>,
        probe: Arc<dyn DriveProbe>,
        processes: Arc<dyn ProcessTable>,
        timings: MountTimings,
    ) -> Self {
        Self {
            runner,
            probe,
            processes,
            timings,
        }
    }

    pub fn runner(&self) -> &RcloneRunner {
        &self.runner
    }

    pub fn timings(&self) -> &MountTimings {
        &self.timings
    }

    /// Build args, spawn, and wait for readiness.
    pub async fn mount(
        &self,
        connection: &Connection,
        letter: DriveLetter,
        vfs: &VfsOptions,
    ) -> MountResult<ProcessHandle> {
        self.probe.prepare(letter).await?;
        let req = MountRequest {
            remote_spec: remote_spec(&connection.remote_name(), connection.remote_path()),
            target: self.probe.mount_target(letter),
            connection_name: connection.name(),
            settings: connection.mount_settings(),
            vfs,
        };
        let args = build_mount_args(&req);
        let handle = ProcessHandle::spawn(self.runner.command(&args))
            .map_err(|e| MountError::LaunchFailed(format!("could not start rclone: {}", e)))?;
        info!(
            "Started rclone mount for '{}' at {} (pid {:?})",
            connection.name(),
            req.target,
            handle.pid()
        );
        self.await_ready(handle, letter).await
    }

    /// Two-phase readiness wait.
    ///
    /// Waits `ready_grace` (or until the process dies), then checks the
    /// target. If it is not reachable yet, waits `ready_extra` more. A
    /// process still running after that is killed and reported as timed
    /// out.
    pub async fn await_ready(
        &self,
        handle: ProcessHandle,
        letter: DriveLetter,
    ) -> MountResult<ProcessHandle> {
        for wait in [self.timings.ready_grace, self.timings.ready_extra] {
            if let Some(reason) = self.wait_or_exit(&handle, wait).await {
                return Err(MountError::LaunchFailed(reason));
            }
            if self.probe.is_reachable(letter).await {
                return Ok(handle);
            }
        }

        warn!("Drive {}: not reachable after launch, stopping rclone", letter);
        if !handle.kill_and_wait(self.timings.stop_grace).await {
            warn!("rclone (pid {:?}) did not exit after kill", handle.pid());
        }
        Err(MountError::TimedOut(letter))
    }

    /// Sleep for `wait` unless the process exits first. Returns the
    /// failure reason when it did.
    async fn wait_or_exit(&self, handle: &ProcessHandle, wait: Duration) -> Option<String> {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = handle.wait() => {}
        }
        let exit = handle.exit_info()?;
        Some(
            handle
                .last_error_line()
                .await
                .unwrap_or_else(|| format!("rclone exited early ({})", exit.describe())),
        )
    }

    /// Terminate every `rclone mount` whose target is exactly `letter`'s.
    pub async fn unmount_letter(&self, letter: DriveLetter) -> MountResult<bool> {
        let target = self.probe.mount_target(letter);
        let victims: Vec<u32> = self
            .processes
            .list()
            .await?
            .into_iter()
            .filter(|p| targets_mount_point(&p.command_line, &target))
            .map(|p| p.pid)
            .collect();

        if victims.is_empty() {
            return Ok(false);
        }
        for pid in &victims {
            self.processes
                .terminate(*pid)
                .await
                .map_err(|e| MountError::UnmountFailed(format!("pid {}: {}", pid, e)))?;
            info!("Terminated rclone pid {} mounted at {}", pid, target);
        }
        Ok(true)
    }

    /// `lsd` the connection's remote path.
    pub async fn test_listing(&self, connection: &Connection) -> MountResult<String> {
        let spec = remote_spec(&connection.remote_name(), connection.remote_path());
        self.runner.list_dirs(&spec, self.timings.test_timeout).await?;
        Ok(CONNECTION_OK.to_string())
    }
}

pub(crate) fn protocol_mismatch(expected: Protocol, connection: &Connection) -> MountError {
    MountError::ProtocolMismatch {
        expected,
        found: connection.protocol(),
    }
}

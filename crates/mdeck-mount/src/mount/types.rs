//! Shared types for the mount engine.

use chrono::{DateTime, Utc};
use mdeck_settings::settings::{DriveLetter, Protocol};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Message recorded when a mounted process exits without being asked to.
pub const UNEXPECTED_TERMINATION: &str = "mount process terminated unexpectedly";

// ─── Status ─────────────────────────────────────────────────────────

/// Lifecycle of one connection's mount.
///
/// ```text
/// Unmounted ─mount─▶ Mounting ─ok─▶ Mounted ─unmount─▶ Unmounting ─ok─▶ (removed)
///                       │                │                  │
///                       └──fail──▶ Error ◀──process exit─────┘──fail
/// ```
///
/// `Error` is not terminal: both a new mount and an unmount are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MountStatus {
    #[default]
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
    Error,
}

impl MountStatus {
    /// A live entry owns its drive letter.
    pub fn holds_letter(&self) -> bool {
        matches!(self, Self::Mounting | Self::Mounted | Self::Unmounting)
    }

    /// A mount or unmount is currently running for the entry.
    pub fn in_flight(&self) -> bool {
        matches!(self, Self::Mounting | Self::Unmounting)
    }
}

impl fmt::Display for MountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmounted => write!(f, "Unmounted"),
            Self::Mounting => write!(f, "Mounting"),
            Self::Mounted => write!(f, "Mounted"),
            Self::Unmounting => write!(f, "Unmounting"),
            Self::Error => write!(f, "Error"),
        }
    }
}

// ─── Snapshots ──────────────────────────────────────────────────────

/// Immutable view of a registry entry handed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountedDrive {
    pub connection_id: String,
    pub connection_name: String,
    pub protocol: Protocol,
    pub drive_letter: DriveLetter,
    pub status: MountStatus,
    pub last_error: Option<String>,
    /// PID of the supervised mount process, when one is attached.
    pub pid: Option<u32>,
    pub mounted_at: Option<DateTime<Utc>>,
}

impl MountedDrive {
    /// Root path as shown to the user, e.g. `Z:\`.
    pub fn mount_path(&self) -> String {
        format!("{}:\\", self.drive_letter)
    }
}

/// Emitted on every state-machine transition, in transition order per
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountStatusChanged {
    pub connection_id: String,
    pub old_status: MountStatus,
    pub new_status: MountStatus,
    pub drive_letter: Option<DriveLetter>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ─── Timings ────────────────────────────────────────────────────────

/// Wait budgets used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTimings {
    /// First wait after launch, catches instant failures.
    pub ready_grace: Duration,
    /// Second wait when the drive is not reachable yet.
    pub ready_extra: Duration,
    /// How long unmount waits for a killed process to exit.
    pub stop_grace: Duration,
    /// Overall bound on unmount-all at shutdown.
    pub shutdown_timeout: Duration,
    /// Bound on `rclone lsd` connection tests.
    pub test_timeout: Duration,
    /// Bound on short rclone commands (config, obscure, version).
    pub command_timeout: Duration,
}

impl Default for MountTimings {
    fn default() -> Self {
        Self {
            ready_grace: Duration::from_secs(2),
            ready_extra: Duration::from_secs(3),
            stop_grace: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            test_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(15),
        }
    }
}

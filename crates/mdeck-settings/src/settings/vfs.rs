//! VFS cache / performance options, global defaults and per-connection
//! mount settings.

use crate::settings::profiles::VfsPerformanceProfile;
use crate::settings::types::DriveLetter;
use serde::{Deserialize, Serialize};
use std::fmt;

/// rclone `--vfs-cache-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VfsCacheMode {
    Off,
    Minimal,
    #[default]
    Writes,
    Full,
}

impl fmt::Display for VfsCacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Minimal => write!(f, "minimal"),
            Self::Writes => write!(f, "writes"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Tunables forwarded to the mount process. Pure values, no behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VfsOptions {
    pub cache_mode: VfsCacheMode,
    /// e.g. `"10G"`, `"500M"`.
    pub cache_max_size: String,
    /// e.g. `"72h"`; `None` = no limit.
    pub cache_max_age: Option<String>,
    /// 0 = unlimited.
    pub cache_max_files: u32,
    pub dir_cache_time_minutes: u32,
    /// Seconds between remote change polls; 0 disables polling.
    pub poll_interval_secs: u32,
    pub buffer_size: String,
    pub chunk_size: String,
    pub transfers: u32,
    pub checkers: u32,
    pub async_read: bool,
    pub async_write: bool,
    /// Octal permission mask, e.g. `"000"` or `"022"`.
    pub umask: String,
    /// 0 = leave ownership to the mount tool.
    pub uid: u32,
    pub gid: u32,
}

impl Default for VfsOptions {
    fn default() -> Self {
        Self {
            cache_mode: VfsCacheMode::Writes,
            cache_max_size: "10G".into(),
            cache_max_age: None,
            cache_max_files: 0,
            dir_cache_time_minutes: 5,
            poll_interval_secs: 60,
            buffer_size: "16M".into(),
            chunk_size: "64M".into(),
            transfers: 4,
            checkers: 8,
            async_read: true,
            async_write: false,
            umask: "000".into(),
            uid: 0,
            gid: 0,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Global defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide VFS defaults applied to every mount unless a connection
/// explicitly overrides them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalVfsSettings {
    #[serde(flatten)]
    pub options: VfsOptions,
    pub performance_profile: VfsPerformanceProfile,
    /// Set once the user moves away from the stock defaults.
    pub is_customized: bool,
}

impl GlobalVfsSettings {
    pub fn apply_profile(&mut self, profile: VfsPerformanceProfile) {
        profile.apply_to(&mut self.options);
        self.performance_profile = profile;
        self.is_customized = true;
    }

    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Per-connection mount settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountSettings {
    /// Preferred letter, empty = auto-assign.
    pub drive_letter: String,
    /// Mount as a network drive rather than a fixed disk.
    pub network_mode: bool,
    /// Label shown by the file manager; defaults to the connection name.
    pub volume_name: Option<String>,
    pub read_only: bool,
    #[serde(flatten)]
    pub vfs: VfsOptions,
    /// When set, `vfs` is ignored and the global defaults apply.
    pub use_global_vfs_settings: bool,
    pub performance_profile: VfsPerformanceProfile,
}

impl Default for MountSettings {
    fn default() -> Self {
        Self {
            drive_letter: String::new(),
            network_mode: true,
            volume_name: None,
            read_only: false,
            vfs: VfsOptions::default(),
            use_global_vfs_settings: true,
            performance_profile: VfsPerformanceProfile::Default,
        }
    }
}

impl MountSettings {
    /// Stored letter, if one is set and well-formed.
    pub fn preferred_letter(&self) -> Option<DriveLetter> {
        DriveLetter::parse(&self.drive_letter)
    }

    /// Options that are authoritative for a mount of this connection.
    pub fn effective_vfs(&self, global: &GlobalVfsSettings) -> VfsOptions {
        if self.use_global_vfs_settings {
            global.options.clone()
        } else {
            self.vfs.clone()
        }
    }

    pub fn apply_profile(&mut self, profile: VfsPerformanceProfile) {
        profile.apply_to(&mut self.vfs);
        self.performance_profile = profile;
    }
}

//! Connection records for every supported remote protocol.

use crate::settings::types::Protocol;
use crate::settings::vfs::MountSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Remote definition name used by rclone: `<proto>_<id without dashes>`.
fn remote_name_for(protocol: Protocol, id: &str) -> String {
    format!("{}_{}", protocol.backend(), id.replace('-', ""))
}

// ─── SFTP ───────────────────────────────────────────────────────────

/// How an SFTP connection authenticates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum AuthenticationType {
    #[default]
    Password,
    KeyFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SftpConnection {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_type: AuthenticationType,
    /// Password already passed through `rclone obscure`.
    pub obscured_password: Option<String>,
    pub key_file_path: Option<String>,
    pub obscured_key_passphrase: Option<String>,
    pub remote_path: String,
    pub mount_settings: MountSettings,
    pub auto_mount: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Default for SftpConnection {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: String::new(),
            host: String::new(),
            port: 22,
            username: String::new(),
            auth_type: AuthenticationType::Password,
            obscured_password: None,
            key_file_path: None,
            obscured_key_passphrase: None,
            remote_path: "/".into(),
            mount_settings: MountSettings::default(),
            auto_mount: false,
            created_at: now,
            modified_at: now,
        }
    }
}

impl SftpConnection {
    pub fn new(name: impl Into<String>, host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn remote_name(&self) -> String {
        remote_name_for(Protocol::Sftp, &self.id)
    }

    pub fn without_secrets(&self) -> Self {
        Self {
            obscured_password: None,
            obscured_key_passphrase: None,
            ..self.clone()
        }
    }
}

// ─── FTP ────────────────────────────────────────────────────────────

/// TLS mode for the FTP control channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FtpTlsMode {
    /// Plain-text FTP.
    #[default]
    None,
    /// TLS from the first byte (usually port 990).
    Implicit,
    /// Plain connect, then AUTH TLS.
    Explicit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FtpConnection {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Empty or `anonymous` logs in anonymously.
    pub username: String,
    pub obscured_password: Option<String>,
    pub tls_mode: FtpTlsMode,
    pub passive_mode: bool,
    pub remote_path: String,
    pub mount_settings: MountSettings,
    pub auto_mount: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Default for FtpConnection {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: String::new(),
            host: String::new(),
            port: 21,
            username: String::new(),
            obscured_password: None,
            tls_mode: FtpTlsMode::None,
            passive_mode: true,
            remote_path: "/".into(),
            mount_settings: MountSettings::default(),
            auto_mount: false,
            created_at: now,
            modified_at: now,
        }
    }
}

impl FtpConnection {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn is_anonymous(&self) -> bool {
        let user = self.username.trim();
        user.is_empty() || user.eq_ignore_ascii_case("anonymous")
    }

    pub fn remote_name(&self) -> String {
        remote_name_for(Protocol::Ftp, &self.id)
    }

    pub fn without_secrets(&self) -> Self {
        Self {
            obscured_password: None,
            ..self.clone()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection (sum type)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A connection of any protocol. The mount engine only reads the shared
/// accessors below; protocol fields are consumed by the matching adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Connection {
    Sftp(SftpConnection),
    Ftp(FtpConnection),
}

impl Connection {
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Sftp(_) => Protocol::Sftp,
            Self::Ftp(_) => Protocol::Ftp,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Sftp(c) => &c.id,
            Self::Ftp(c) => &c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sftp(c) => &c.name,
            Self::Ftp(c) => &c.name,
        }
    }

    pub fn auto_mount(&self) -> bool {
        match self {
            Self::Sftp(c) => c.auto_mount,
            Self::Ftp(c) => c.auto_mount,
        }
    }

    pub fn remote_path(&self) -> &str {
        match self {
            Self::Sftp(c) => &c.remote_path,
            Self::Ftp(c) => &c.remote_path,
        }
    }

    pub fn mount_settings(&self) -> &MountSettings {
        match self {
            Self::Sftp(c) => &c.mount_settings,
            Self::Ftp(c) => &c.mount_settings,
        }
    }

    pub fn mount_settings_mut(&mut self) -> &mut MountSettings {
        match self {
            Self::Sftp(c) => &mut c.mount_settings,
            Self::Ftp(c) => &mut c.mount_settings,
        }
    }

    pub fn remote_name(&self) -> String {
        match self {
            Self::Sftp(c) => c.remote_name(),
            Self::Ftp(c) => c.remote_name(),
        }
    }

    pub fn touch(&mut self) {
        let now = Utc::now();
        match self {
            Self::Sftp(c) => c.modified_at = now,
            Self::Ftp(c) => c.modified_at = now,
        }
    }

    /// Copy with every obscured secret removed.
    pub fn strip_secrets(&self) -> Self {
        match self {
            Self::Sftp(c) => Self::Sftp(c.without_secrets()),
            Self::Ftp(c) => Self::Ftp(c.without_secrets()),
        }
    }
}

impl From<SftpConnection> for Connection {
    fn from(c: SftpConnection) -> Self {
        Self::Sftp(c)
    }
}

impl From<FtpConnection> for Connection {
    fn from(c: FtpConnection) -> Self {
        Self::Ftp(c)
    }
}

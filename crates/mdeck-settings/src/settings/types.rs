//! Shared types: drive letters, protocols, application settings.

use crate::settings::connection::{FtpConnection, SftpConnection};
use crate::settings::vfs::GlobalVfsSettings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Drive letter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A local drive root identifier, always an uppercase ASCII letter `A`–`Z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DriveLetter(char);

impl DriveLetter {
    /// Build from a single character. Lowercase input is normalised.
    pub fn new(c: char) -> Option<Self> {
        let upper = c.to_ascii_uppercase();
        if upper.is_ascii_uppercase() {
            Some(Self(upper))
        } else {
            None
        }
    }

    /// Parse user input such as `"z"`, `"Z"`, `"Z:"` or `"Z:\"`.
    /// Returns `None` for empty or malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let rest = trimmed
            .strip_suffix('\\')
            .or_else(|| trimmed.strip_suffix('/'))
            .unwrap_or(trimmed);
        let rest = rest.strip_suffix(':').unwrap_or(rest);
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }

    /// All 26 letters in alphabetical order.
    pub fn all() -> impl DoubleEndedIterator<Item = DriveLetter> {
        ('A'..='Z').map(DriveLetter)
    }
}

impl fmt::Display for DriveLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DriveLetter {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid drive letter '{}'", value))
    }
}

impl From<DriveLetter> for String {
    fn from(letter: DriveLetter) -> String {
        letter.0.to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Protocol
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Remote protocol a connection speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Sftp,
    Ftp,
}

impl Protocol {
    /// Every supported protocol, in auto-mount order.
    pub const ALL: [Protocol; 2] = [Protocol::Sftp, Protocol::Ftp];

    /// Backend type name understood by `rclone config create`.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Sftp => "sftp",
            Self::Ftp => "ftp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sftp => write!(f, "SFTP"),
            Self::Ftp => write!(f, "FTP"),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Application settings
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything persisted in `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Mount every flagged connection when the application starts.
    pub auto_mount_on_startup: bool,
    /// Unmount all drives when the application exits.
    pub unmount_on_close: bool,
    /// Show desktop notifications for mount events.
    pub show_notifications: bool,
    /// Path to a custom rclone executable (`None` = bundled / PATH).
    pub custom_rclone_path: Option<String>,
    /// VFS cache location (`None` = `<data dir>/cache`).
    pub cache_directory: Option<String>,
    #[serde(rename = "connections")]
    pub sftp_connections: Vec<SftpConnection>,
    pub ftp_connections: Vec<FtpConnection>,
    pub global_vfs_settings: GlobalVfsSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_mount_on_startup: true,
            unmount_on_close: true,
            show_notifications: true,
            custom_rclone_path: None,
            cache_directory: None,
            sftp_connections: Vec::new(),
            ftp_connections: Vec::new(),
            global_vfs_settings: GlobalVfsSettings::default(),
        }
    }
}

/// Envelope written by settings export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub export_version: u32,
    pub export_date: DateTime<Utc>,
    pub app_settings: AppSettings,
}

/// Current export format version.
pub const EXPORT_VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letter_parse_variants() {
        assert_eq!(DriveLetter::parse("z"), DriveLetter::new('Z'));
        assert_eq!(DriveLetter::parse("Z:"), DriveLetter::new('Z'));
        assert_eq!(DriveLetter::parse(" Y:\\ "), DriveLetter::new('Y'));
        assert_eq!(DriveLetter::parse("X:/"), DriveLetter::new('X'));
        assert_eq!(DriveLetter::parse(""), None);
        assert_eq!(DriveLetter::parse("ZZ"), None);
        assert_eq!(DriveLetter::parse("1"), None);
        assert_eq!(DriveLetter::parse("D:\\sub"), None);
    }

    #[test]
    fn drive_letter_serde_as_string() {
        let z = DriveLetter::new('z').unwrap();
        assert_eq!(serde_json::to_string(&z).unwrap(), "\"Z\"");
        let back: DriveLetter = serde_json::from_str("\"q:\"").unwrap();
        assert_eq!(back.as_char(), 'Q');
        assert!(serde_json::from_str::<DriveLetter>("\"??\"").is_err());
    }

    #[test]
    fn drive_letter_all_is_alphabet() {
        let all: Vec<char> = DriveLetter::all().map(|d| d.as_char()).collect();
        assert_eq!(all.len(), 26);
        assert_eq!(all.first(), Some(&'A'));
        assert_eq!(all.last(), Some(&'Z'));
    }

    #[test]
    fn protocol_backend_names() {
        assert_eq!(Protocol::Sftp.backend(), "sftp");
        assert_eq!(Protocol::Ftp.backend(), "ftp");
        assert_eq!(Protocol::Ftp.to_string(), "FTP");
    }

    #[test]
    fn app_settings_tolerates_missing_fields() {
        let s: AppSettings = serde_json::from_str(r#"{"showNotifications": false}"#).unwrap();
        assert!(!s.show_notifications);
        assert!(s.auto_mount_on_startup);
        assert!(s.unmount_on_close);
        assert!(s.sftp_connections.is_empty());
    }
}

//! # Settings Store
//!
//! JSON-file persistence for [`AppSettings`].
//!
//! ## Layout
//!
//! Everything lives under one data directory
//! (`<data_local_dir>/MountDeck`, or `$MOUNTDECK_DATA_DIR` when set):
//!
//! - **settings.json** – connections, preferences and global VFS defaults
//! - **rclone.conf** – remote definitions, owned by rclone itself
//! - **cache/** – default VFS cache directory
//!
//! ## Concurrency
//!
//! Readers take a snapshot under a read lock. Every mutation goes through
//! [`SettingsStore::update`], which holds a dedicated save lock across the
//! mutation and the file write, so the file on disk always reflects the
//! most recent mutation.

use crate::settings::connection::Connection;
use crate::settings::error::{SettingsError, SettingsResult};
use crate::settings::profiles::VfsPerformanceProfile;
use crate::settings::types::{AppSettings, ExportData, Protocol, EXPORT_VERSION};
use crate::settings::validate::validate_vfs;
use crate::settings::vfs::GlobalVfsSettings;
use chrono::Utc;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "MOUNTDECK_DATA_DIR";

const APP_DIR_NAME: &str = "MountDeck";
const RCLONE_CONF_HEADER: &str = "# rclone config managed by MountDeck\n";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Paths
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPaths {
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub rclone_config: PathBuf,
    pub cache_dir: PathBuf,
}

impl SettingsPaths {
    /// All files rooted at `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let data_dir = dir.into();
        Self {
            settings_file: data_dir.join("settings.json"),
            rclone_config: data_dir.join("rclone.conf"),
            cache_dir: data_dir.join("cache"),
            data_dir,
        }
    }

    /// `$MOUNTDECK_DATA_DIR` if set, else the per-user local data directory.
    pub fn from_env() -> SettingsResult<Self> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::in_dir(PathBuf::from(dir)));
        }
        let base = dirs::data_local_dir().ok_or(SettingsError::NoDataDir)?;
        Ok(Self::in_dir(base.join(APP_DIR_NAME)))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Import summary
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of merging an export file into the current settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Connections added under fresh identifiers.
    pub added: usize,
    /// Connections skipped because one with the same name already exists.
    pub skipped: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub type SettingsStoreState = Arc<SettingsStore>;

pub struct SettingsStore {
    paths: SettingsPaths,
    settings: RwLock<AppSettings>,
    save_lock: Mutex<()>,
}

impl SettingsStore {
    /// Open the store rooted at `paths`.
    ///
    /// Creates the data and cache directories and an empty `rclone.conf`
    /// when missing. A settings file that cannot be parsed is logged and
    /// replaced by defaults in memory; it is only overwritten on the next
    /// mutation.
    pub async fn open(paths: SettingsPaths) -> SettingsResult<SettingsStoreState> {
        for dir in [&paths.data_dir, &paths.cache_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| SettingsError::io(dir, e))?;
        }

        let settings = match tokio::fs::read_to_string(&paths.settings_file).await {
            Ok(json) => match serde_json::from_str::<AppSettings>(&json) {
                Ok(s) => s,
                Err(e) => {
                    warn!(
                        "Settings file {} is unreadable ({}); starting from defaults",
                        paths.settings_file.display(),
                        e
                    );
                    AppSettings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
            Err(e) => return Err(SettingsError::io(&paths.settings_file, e)),
        };

        if !tokio::fs::try_exists(&paths.rclone_config).await.unwrap_or(false) {
            tokio::fs::write(&paths.rclone_config, RCLONE_CONF_HEADER)
                .await
                .map_err(|e| SettingsError::io(&paths.rclone_config, e))?;
        }

        info!(
            "Settings loaded from {} ({} SFTP, {} FTP connections)",
            paths.settings_file.display(),
            settings.sftp_connections.len(),
            settings.ftp_connections.len()
        );

        Ok(Arc::new(Self {
            paths,
            settings: RwLock::new(settings),
            save_lock: Mutex::new(()),
        }))
    }

    pub fn paths(&self) -> &SettingsPaths {
        &self.paths
    }

    /// VFS cache directory: the configured override or `<data dir>/cache`.
    pub async fn cache_dir(&self) -> PathBuf {
        self.settings
            .read()
            .await
            .cache_directory
            .as_ref()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.paths.cache_dir.clone())
    }

    pub async fn snapshot(&self) -> AppSettings {
        self.settings.read().await.clone()
    }

    /// Apply `f` to the settings and persist the result.
    ///
    /// If `f` fails nothing is written and the in-memory settings are
    /// left untouched.
    pub async fn update<R>(
        &self,
        f: impl FnOnce(&mut AppSettings) -> SettingsResult<R>,
    ) -> SettingsResult<R> {
        let _save = self.save_lock.lock().await;
        let (out, snapshot) = {
            let mut guard = self.settings.write().await;
            let mut draft = guard.clone();
            let out = f(&mut draft)?;
            *guard = draft.clone();
            (out, draft)
        };
        self.write_file(&snapshot).await?;
        Ok(out)
    }

    /// Persist the current settings unchanged.
    pub async fn save(&self) -> SettingsResult<()> {
        let _save = self.save_lock.lock().await;
        let snapshot = self.snapshot().await;
        self.write_file(&snapshot).await
    }

    async fn write_file(&self, settings: &AppSettings) -> SettingsResult<()> {
        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.paths.settings_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SettingsError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.paths.settings_file)
            .await
            .map_err(|e| SettingsError::io(&self.paths.settings_file, e))
    }

    // ── Connections ──────────────────────────────────────────────────

    pub async fn connections(&self, protocol: Protocol) -> Vec<Connection> {
        let s = self.settings.read().await;
        match protocol {
            Protocol::Sftp => s.sftp_connections.iter().cloned().map(Connection::Sftp).collect(),
            Protocol::Ftp => s.ftp_connections.iter().cloned().map(Connection::Ftp).collect(),
        }
    }

    pub async fn all_connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for protocol in Protocol::ALL {
            out.extend(self.connections(protocol).await);
        }
        out
    }

    pub async fn get_connection(&self, id: &str) -> Option<Connection> {
        let s = self.settings.read().await;
        find(&s, id)
    }

    pub async fn add_connection(&self, connection: Connection) -> SettingsResult<Connection> {
        validate_connection(&connection)?;
        self.update(|s| {
            if find(s, connection.id()).is_some() {
                return Err(SettingsError::DuplicateId(connection.id().to_string()));
            }
            match connection.clone() {
                Connection::Sftp(c) => s.sftp_connections.push(c),
                Connection::Ftp(c) => s.ftp_connections.push(c),
            }
            Ok(connection)
        })
        .await
    }

    /// Replace the stored record with the same id, stamping `modified_at`.
    pub async fn update_connection(&self, mut connection: Connection) -> SettingsResult<Connection> {
        validate_connection(&connection)?;
        connection.touch();
        self.update(|s| {
            let id = connection.id().to_string();
            let slot = match &connection {
                Connection::Sftp(c) => s
                    .sftp_connections
                    .iter_mut()
                    .find(|x| x.id == id)
                    .map(|x| *x = c.clone()),
                Connection::Ftp(c) => s
                    .ftp_connections
                    .iter_mut()
                    .find(|x| x.id == id)
                    .map(|x| *x = c.clone()),
            };
            slot.ok_or(SettingsError::NotFound(id))?;
            Ok(connection)
        })
        .await
    }

    pub async fn delete_connection(&self, id: &str) -> SettingsResult<Connection> {
        self.update(|s| {
            if let Some(pos) = s.sftp_connections.iter().position(|c| c.id == id) {
                return Ok(Connection::Sftp(s.sftp_connections.remove(pos)));
            }
            if let Some(pos) = s.ftp_connections.iter().position(|c| c.id == id) {
                return Ok(Connection::Ftp(s.ftp_connections.remove(pos)));
            }
            Err(SettingsError::NotFound(id.to_string()))
        })
        .await
    }

    // ── Global VFS defaults ──────────────────────────────────────────

    pub async fn global_vfs(&self) -> GlobalVfsSettings {
        self.settings.read().await.global_vfs_settings.clone()
    }

    pub async fn set_global_vfs(&self, vfs: GlobalVfsSettings) -> SettingsResult<()> {
        validate_vfs(&vfs.options)?;
        self.update(|s| {
            s.global_vfs_settings = vfs;
            Ok(())
        })
        .await
    }

    pub async fn apply_global_profile(
        &self,
        profile: VfsPerformanceProfile,
    ) -> SettingsResult<GlobalVfsSettings> {
        self.update(|s| {
            s.global_vfs_settings.apply_profile(profile);
            Ok(s.global_vfs_settings.clone())
        })
        .await
    }

    pub async fn reset_global_vfs(&self) -> SettingsResult<()> {
        self.update(|s| {
            s.global_vfs_settings.reset_to_defaults();
            Ok(())
        })
        .await
    }

    // ── Export / import ──────────────────────────────────────────────

    /// Serialise the settings into an export envelope.
    ///
    /// Obscured passwords and key passphrases are only included when
    /// `include_secrets` is set.
    pub async fn export_json(&self, include_secrets: bool) -> SettingsResult<String> {
        let mut app_settings = self.snapshot().await;
        if !include_secrets {
            for c in app_settings.sftp_connections.iter_mut() {
                *c = c.without_secrets();
            }
            for c in app_settings.ftp_connections.iter_mut() {
                *c = c.without_secrets();
            }
        }
        let data = ExportData {
            export_version: EXPORT_VERSION,
            export_date: Utc::now(),
            app_settings,
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    pub async fn export_to_file(&self, path: &Path, include_secrets: bool) -> SettingsResult<()> {
        let json = self.export_json(include_secrets).await?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| SettingsError::io(path, e))?;
        info!("Exported settings to {}", path.display());
        Ok(())
    }

    /// Merge an export envelope into the current settings.
    ///
    /// Preferences are taken from the import. Connections are added under
    /// fresh identifiers unless a connection with the same name already
    /// exists for that protocol, in which case they are skipped.
    pub async fn import_json(&self, json: &str) -> SettingsResult<ImportSummary> {
        let data: ExportData = serde_json::from_str(json)?;
        let incoming = data.app_settings;
        self.update(move |s| {
            s.auto_mount_on_startup = incoming.auto_mount_on_startup;
            s.unmount_on_close = incoming.unmount_on_close;
            s.show_notifications = incoming.show_notifications;
            s.cache_directory = incoming.cache_directory;

            let mut summary = ImportSummary::default();
            for mut c in incoming.sftp_connections {
                if s.sftp_connections.iter().any(|x| x.name == c.name) {
                    summary.skipped += 1;
                    continue;
                }
                c.id = uuid::Uuid::new_v4().to_string();
                s.sftp_connections.push(c);
                summary.added += 1;
            }
            for mut c in incoming.ftp_connections {
                if s.ftp_connections.iter().any(|x| x.name == c.name) {
                    summary.skipped += 1;
                    continue;
                }
                c.id = uuid::Uuid::new_v4().to_string();
                s.ftp_connections.push(c);
                summary.added += 1;
            }
            Ok(summary)
        })
        .await
    }

    pub async fn import_from_file(&self, path: &Path) -> SettingsResult<ImportSummary> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SettingsError::io(path, e))?;
        let summary = self.import_json(&json).await?;
        info!(
            "Imported settings from {}: {} added, {} skipped",
            path.display(),
            summary.added,
            summary.skipped
        );
        Ok(summary)
    }
}

fn find(s: &AppSettings, id: &str) -> Option<Connection> {
    s.sftp_connections
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .map(Connection::Sftp)
        .or_else(|| {
            s.ftp_connections
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .map(Connection::Ftp)
        })
}

fn validate_connection(c: &Connection) -> SettingsResult<()> {
    if c.id().trim().is_empty() {
        return Err(SettingsError::invalid("id", "must not be empty"));
    }
    if c.name().trim().is_empty() {
        return Err(SettingsError::invalid("name", "must not be empty"));
    }
    let ms = c.mount_settings();
    if !ms.drive_letter.trim().is_empty() && ms.preferred_letter().is_none() {
        return Err(SettingsError::invalid(
            "driveLetter",
            format!("'{}' is not a drive letter", ms.drive_letter),
        ));
    }
    if !ms.use_global_vfs_settings {
        validate_vfs(&ms.vfs)?;
    }
    Ok(())
}

//! Read-only settings view consumed by the mount engine.

use crate::settings::connection::Connection;
use crate::settings::store::SettingsStore;
use crate::settings::types::Protocol;
use crate::settings::vfs::GlobalVfsSettings;

/// What the mount engine needs from persistence. Every call returns the
/// latest values; implementors must not cache.
#[async_trait::async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn list_connections(&self, protocol: Protocol) -> Vec<Connection>;
    async fn global_defaults(&self) -> GlobalVfsSettings;
    async fn auto_mount_enabled(&self) -> bool;
    async fn unmount_on_close_enabled(&self) -> bool;
    async fn notifications_enabled(&self) -> bool;
    /// Custom rclone executable configured by the user, if any.
    async fn custom_rclone_path(&self) -> Option<String> {
        None
    }
}

#[async_trait::async_trait]
impl SettingsProvider for SettingsStore {
    async fn list_connections(&self, protocol: Protocol) -> Vec<Connection> {
        self.connections(protocol).await
    }

    async fn global_defaults(&self) -> GlobalVfsSettings {
        self.global_vfs().await
    }

    async fn auto_mount_enabled(&self) -> bool {
        self.snapshot().await.auto_mount_on_startup
    }

    async fn unmount_on_close_enabled(&self) -> bool {
        self.snapshot().await.unmount_on_close
    }

    async fn notifications_enabled(&self) -> bool {
        self.snapshot().await.show_notifications
    }

    async fn custom_rclone_path(&self) -> Option<String> {
        self.snapshot()
            .await
            .custom_rclone_path
            .filter(|p| !p.trim().is_empty())
    }
}

//! SFTP mount adapter.

use crate::mount::adapter::{protocol_mismatch, MountAdapter, MountDriver};
use crate::mount::error::MountResult;
use crate::mount::process::ProcessHandle;
use mdeck_settings::settings::{
    AuthenticationType, Connection, DriveLetter, Protocol, SftpConnection, VfsOptions,
};
use std::sync::Arc;

/// `rclone config create` parameters for an SFTP remote.
pub fn remote_params(c: &SftpConnection) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("host", c.host.clone()),
        ("port", c.port.to_string()),
        ("user", c.username.clone()),
    ];
    match c.auth_type {
        AuthenticationType::Password => {
            if let Some(pass) = c.obscured_password.as_ref().filter(|p| !p.is_empty()) {
                params.push(("pass", pass.clone()));
            }
        }
        AuthenticationType::KeyFile => {
            if let Some(key) = c.key_file_path.as_ref().filter(|k| !k.is_empty()) {
                params.push(("key_file", key.clone()));
                if let Some(pp) = c.obscured_key_passphrase.as_ref().filter(|p| !p.is_empty()) {
                    params.push(("key_file_pass", pp.clone()));
                }
            }
        }
    }
    params
}

pub struct SftpAdapter {
    driver: Arc<MountDriver>,
}

impl SftpAdapter {
    pub fn new(driver: Arc<MountDriver>) -> Self {
        Self { driver }
    }

    fn record<'a>(&self, connection: &'a Connection) -> MountResult<&'a SftpConnection> {
        match connection {
            Connection::Sftp(c) => Ok(c),
            other => Err(protocol_mismatch(Protocol::Sftp, other)),
        }
    }
}

#[async_trait::async_trait]
impl MountAdapter for SftpAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Sftp
    }

    async fn ensure_remote(&self, connection: &Connection) -> MountResult<()> {
        let c = self.record(connection)?;
        self.driver
            .runner()
            .create_remote(&c.remote_name(), Protocol::Sftp.backend(), &remote_params(c))
            .await
    }

    async fn delete_remote(&self, connection: &Connection) -> MountResult<()> {
        let c = self.record(connection)?;
        self.driver.runner().delete_remote(&c.remote_name()).await
    }

    async fn test_connection(&self, connection: &Connection) -> MountResult<String> {
        self.ensure_remote(connection).await?;
        self.driver.test_listing(connection).await
    }

    async fn mount(
        &self,
        connection: &Connection,
        letter: DriveLetter,
        vfs: &VfsOptions,
    ) -> MountResult<ProcessHandle> {
        self.ensure_remote(connection).await?;
        self.driver.mount(connection, letter, vfs).await
    }

    async fn unmount(&self, letter: DriveLetter) -> MountResult<bool> {
        self.driver.unmount_letter(letter).await
    }
}

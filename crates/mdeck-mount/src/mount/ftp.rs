//! FTP / FTPS mount adapter.

use crate::mount::adapter::{protocol_mismatch, MountAdapter, MountDriver};
use crate::mount::error::MountResult;
use crate::mount::process::ProcessHandle;
use mdeck_settings::settings::{
    Connection, DriveLetter, FtpConnection, FtpTlsMode, Protocol, VfsOptions,
};
use std::sync::Arc;

/// `rclone config create` parameters for an FTP remote. Anonymous
/// connections send no credentials.
pub fn remote_params(c: &FtpConnection) -> Vec<(&'static str, String)> {
    let mut params = vec![("host", c.host.clone()), ("port", c.port.to_string())];
    if !c.is_anonymous() {
        params.push(("user", c.username.clone()));
        if let Some(pass) = c.obscured_password.as_ref().filter(|p| !p.is_empty()) {
            params.push(("pass", pass.clone()));
        }
    }
    match c.tls_mode {
        FtpTlsMode::None => {}
        FtpTlsMode::Implicit => params.push(("tls", "true".into())),
        FtpTlsMode::Explicit => params.push(("explicit_tls", "true".into())),
    }
    params.push(("passive", c.passive_mode.to_string()));
    params
}

pub struct FtpAdapter {
    driver: Arc<MountDriver>,
}

impl FtpAdapter {
    pub fn new(driver: Arc<MountDriver>) -> Self {
        Self { driver }
    }

    fn record<'a>(&self, connection: &'a Connection) -> MountResult<&'a FtpConnection> {
        match connection {
            Connection::Ftp(c) => Ok(c),
            other => Err(protocol_mismatch(Protocol::Ftp, other)),
        }
    }
}

#[async_trait::async_trait]
impl MountAdapter for FtpAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    async fn ensure_remote(&self, connection: &Connection) -> MountResult<()> {
        let c = self.record(connection)?;
        self.driver
            .runner()
            .create_remote(&c.remote_name(), Protocol::Ftp.backend(), &remote_params(c))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(params: &'a [(&str, String)], key: &str) -> Option<&'a str> {
        params.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    #[test]
    fn anonymous_sends_no_credentials() {
        let mut c = FtpConnection::new("mirror", "ftp.example.org");
        c.obscured_password = Some("x".into());
        let p = remote_params(&c);
        assert_eq!(get(&p, "user"), None);
        assert_eq!(get(&p, "pass"), None);
        assert_eq!(get(&p, "port"), Some("21"));
    }

    #[test]
    fn named_user_with_password() {
        let mut c = FtpConnection::new("work", "ftp.corp");
        c.username = "carol".into();
        c.obscured_password = Some("OBS".into());
        let p = remote_params(&c);
        assert_eq!(get(&p, "user"), Some("carol"));
        assert_eq!(get(&p, "pass"), Some("OBS"));
    }

    #[test]
    fn tls_modes() {
        let mut c = FtpConnection::new("s", "h");
        assert_eq!(get(&remote_params(&c), "tls"), None);
        c.tls_mode = FtpTlsMode::Implicit;
        assert_eq!(get(&remote_params(&c), "tls"), Some("true"));
        assert_eq!(get(&remote_params(&c), "explicit_tls"), None);
        c.tls_mode = FtpTlsMode::Explicit;
        assert_eq!(get(&remote_params(&c), "explicit_tls"), Some("true"));
        assert_eq!(get(&remote_params(&c), "tls"), None);
    }

    #[test]
    fn passive_flag() {
        let mut c = FtpConnection::new("s", "h");
        assert_eq!(get(&remote_params(&c), "passive"), Some("true"));
        c.passive_mode = false;
        assert_eq!(get(&remote_params(&c), "passive"), Some("false"));
    }
}

//! Mount engine error taxonomy.

use crate::mount::types::UNEXPECTED_TERMINATION;
use mdeck_settings::settings::{DriveLetter, Protocol};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MountError {
    /// Every letter A–Z is taken by the system or a live mount.
    #[error("no drive letter available")]
    NoDriveLetterAvailable,
    #[error("drive letter {0}: is already in use")]
    DriveLetterInUse(DriveLetter),
    #[error("a mount or unmount for '{0}' is already in progress")]
    AlreadyInProgress(String),
    #[error("'{0}' is already mounted")]
    AlreadyMounted(String),
    #[error("no mount adapter registered for {0}")]
    AdapterMissing(Protocol),
    #[error("{expected} adapter cannot handle a {found} connection")]
    ProtocolMismatch { expected: Protocol, found: Protocol },
    /// The process could not start or died inside the grace window.
    #[error("mount failed: {0}")]
    LaunchFailed(String),
    /// The process kept running but the drive never became reachable.
    #[error("drive {0}: did not become available in time")]
    TimedOut(DriveLetter),
    #[error("{}", UNEXPECTED_TERMINATION)]
    UnexpectedTermination,
    #[error("unmount failed: {0}")]
    UnmountFailed(String),
    #[error("rclone {command} failed: {message}")]
    Rclone { command: String, message: String },
    #[error("rclone {0} timed out")]
    CommandTimedOut(String),
    #[error("rclone executable not found")]
    BinaryNotFound,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MountError {
    pub fn rclone(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rclone {
            command: command.into(),
            message: message.into(),
        }
    }
}

impl From<MountError> for String {
    fn from(e: MountError) -> String {
        e.to_string()
    }
}

pub type MountResult<T> = Result<T, MountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            MountError::UnexpectedTermination.to_string(),
            "mount process terminated unexpectedly"
        );
        let z = DriveLetter::new('Z').unwrap();
        assert_eq!(MountError::DriveLetterInUse(z).to_string(), "drive letter Z: is already in use");
        let s: String = MountError::rclone("config create", "exit status 1").into();
        assert_eq!(s, "rclone config create failed: exit status 1");
    }
}

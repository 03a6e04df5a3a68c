//! Mount engine module root – re-exports public API surface.

pub mod types;
pub mod error;
pub mod letters;
pub mod process;
pub mod rclone;
pub mod args;
pub mod adapter;
pub mod sftp;
pub mod ftp;
pub mod registry;
pub mod supervisor;
pub mod notify;
pub mod driver;
pub mod service;

pub use types::*;
pub use error::{MountError, MountResult};
pub use letters::{available_letters, DriveProbe, SystemDrives};
pub use process::{ExitInfo, ProcessHandle, ProcessInfo, ProcessTable, SimulatedProcess, SystemProcessTable};
pub use rclone::{RcloneOutput, RcloneRunner};
pub use adapter::{MountAdapter, MountDriver};
pub use sftp::SftpAdapter;
pub use ftp::FtpAdapter;
pub use registry::MountRegistry;
pub use notify::{LogNotifier, Notification, Notifier};
pub use driver::{detect_filesystem_driver, DriverStatus};
pub use service::{MountManager, MountManagerBuilder, MountManagerState};

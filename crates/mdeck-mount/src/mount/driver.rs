//! Filesystem driver preflight (WinFsp on Windows, FUSE elsewhere).

use serde::{Deserialize, Serialize};

pub const WINFSP_DOWNLOAD_URL: &str = "https://github.com/winfsp/winfsp/releases/latest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStatus {
    pub installed: bool,
    pub name: String,
    /// Where it was found, or why it was not.
    pub detail: String,
    pub download_url: Option<String>,
}

#[cfg(target_os = "windows")]
pub fn detect_filesystem_driver() -> DriverStatus {
    use std::path::PathBuf;

    let mut candidates: Vec<PathBuf> = Vec::new();
    for var in ["ProgramFiles(x86)", "ProgramFiles"] {
        if let Some(dir) = std::env::var_os(var) {
            candidates.push(PathBuf::from(dir).join("WinFsp").join("bin"));
        }
    }
    let system_root = std::env::var_os("SystemRoot")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(r"C:\Windows"));
    for dll in ["winfsp-x64.dll", "winfsp-x86.dll"] {
        candidates.push(system_root.join("System32").join(dll));
    }

    match candidates.into_iter().find(|p| p.exists()) {
        Some(found) => DriverStatus {
            installed: true,
            name: "WinFsp".into(),
            detail: found.display().to_string(),
            download_url: None,
        },
        None => DriverStatus {
            installed: false,
            name: "WinFsp".into(),
            detail: "WinFsp is not installed; drives cannot be mounted".into(),
            download_url: Some(WINFSP_DOWNLOAD_URL.into()),
        },
    }
}

#[cfg(not(target_os = "windows"))]
pub fn detect_filesystem_driver() -> DriverStatus {
    fuse_status(std::path::Path::new("/dev/fuse"))
}

#[cfg(not(target_os = "windows"))]
fn fuse_status(device: &std::path::Path) -> DriverStatus {
    if device.exists() {
        DriverStatus {
            installed: true,
            name: "FUSE".into(),
            detail: device.display().to_string(),
            download_url: None,
        }
    } else {
        DriverStatus {
            installed: false,
            name: "FUSE".into(),
            detail: format!("{} not found; install fuse3", device.display()),
            download_url: None,
        }
    }
}

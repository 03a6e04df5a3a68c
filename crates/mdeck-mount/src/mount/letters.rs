//! Drive-letter allocation and the system drive probe.

use mdeck_settings::settings::DriveLetter;
use std::collections::HashSet;
use std::path::PathBuf;

/// Letters not present in `used`, Z first so A–C stay free for fixed
/// disks. Pure function of its input.
pub fn available_letters(used: &HashSet<DriveLetter>) -> Vec<DriveLetter> {
    DriveLetter::all().rev().filter(|l| !used.contains(l)).collect()
}

/// Host filesystem seam: which letters exist, whether a mount target is
/// reachable, and how a letter maps to the target rclone mounts on.
#[async_trait::async_trait]
pub trait DriveProbe: Send + Sync {
    /// Point-in-time set of letters the system already uses. The scan
    /// touches the filesystem and runs off the async workers.
    async fn used_letters(&self) -> HashSet<DriveLetter>;

    /// Whether the mounted filesystem can be enumerated.
    async fn is_reachable(&self, letter: DriveLetter) -> bool;

    /// Target argument passed to `rclone mount` for `letter`.
    fn mount_target(&self, letter: DriveLetter) -> String;

    /// Make the target ready before launch.
    async fn prepare(&self, _letter: DriveLetter) -> std::io::Result<()> {
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  System implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Real drives. On Windows letters are drive roots (`Z:`); elsewhere each
/// letter maps to a directory `<mount_root>/<letter>`, which counts as
/// used while something is mounted on it.
#[derive(Debug, Clone)]
pub struct SystemDrives {
    #[cfg_attr(target_os = "windows", allow(dead_code))]
    mount_root: PathBuf,
}

impl SystemDrives {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn letter_dir(&self, letter: DriveLetter) -> PathBuf {
        self.mount_root.join(letter.to_string())
    }
}

#[cfg(target_os = "windows")]
#[async_trait::async_trait]
impl DriveProbe for SystemDrives {
    async fn used_letters(&self) -> HashSet<DriveLetter> {
        tokio::task::spawn_blocking(|| {
            DriveLetter::all()
                .filter(|l| std::fs::metadata(format!("{}:\\", l)).is_ok())
                .collect::<HashSet<_>>()
        })
        .await
        .unwrap_or_default()
    }

    async fn is_reachable(&self, letter: DriveLetter) -> bool {
        tokio::fs::metadata(format!("{}:\\", letter))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn mount_target(&self, letter: DriveLetter) -> String {
        format!("{}:", letter)
    }
}

#[cfg(not(target_os = "windows"))]
#[async_trait::async_trait]
impl DriveProbe for SystemDrives {
    async fn used_letters(&self) -> HashSet<DriveLetter> {
        let root = self.mount_root.clone();
        tokio::task::spawn_blocking(move || {
            DriveLetter::all()
                .filter(|l| is_mount_point(&root.join(l.to_string())))
                .collect::<HashSet<_>>()
        })
        .await
        .unwrap_or_default()
    }

    async fn is_reachable(&self, letter: DriveLetter) -> bool {
        let dir = self.letter_dir(letter);
        tokio::task::spawn_blocking(move || is_mount_point(&dir) && std::fs::read_dir(&dir).is_ok())
            .await
            .unwrap_or(false)
    }

    fn mount_target(&self, letter: DriveLetter) -> String {
        self.letter_dir(letter).to_string_lossy().into_owned()
    }

    async fn prepare(&self, letter: DriveLetter) -> std::io::Result<()> {
        tokio::fs::create_dir_all(self.letter_dir(letter)).await
    }
}

/// A directory is a mount point when it lives on a different device
/// than its parent.
#[cfg(not(target_os = "windows"))]
fn is_mount_point(dir: &std::path::Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Some(parent) = dir.parent() else {
        return false;
    };
    match (std::fs::metadata(dir), std::fs::metadata(parent)) {
        (Ok(d), Ok(p)) => d.dev() != p.dev(),
        _ => false,
    }
}

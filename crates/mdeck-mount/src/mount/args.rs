//! `rclone mount` argument builder.

use mdeck_settings::settings::{MountSettings, VfsOptions};

/// Everything that goes into one `rclone mount` invocation.
#[derive(Debug, Clone)]
pub struct MountRequest<'a> {
    /// `<remote>:<path>`.
    pub remote_spec: String,
    /// Drive (`Z:`) or directory the filesystem appears at.
    pub target: String,
    /// Fallback volume label.
    pub connection_name: &'a str,
    pub settings: &'a MountSettings,
    /// Authoritative VFS options (global or connection override).
    pub vfs: &'a VfsOptions,
}

/// `<remote>:<path>` with the path forced to start at the root.
pub fn remote_spec(remote_name: &str, remote_path: &str) -> String {
    let path = remote_path.trim();
    if path.is_empty() {
        format!("{}:/", remote_name)
    } else if path.starts_with('/') {
        format!("{}:{}", remote_name, path)
    } else {
        format!("{}:/{}", remote_name, path)
    }
}

/// Build the full argument list.
pub fn build_mount_args(req: &MountRequest<'_>) -> Vec<String> {
    let s = req.settings;
    let v = req.vfs;
    let mut args: Vec<String> = vec!["mount".into(), req.remote_spec.clone(), req.target.clone()];

    // Mount options
    if s.network_mode {
        args.push("--network-mode".into());
    }
    args.push("--volname".into());
    match s.volume_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => args.push(name.to_string()),
        None => args.push(req.connection_name.to_string()),
    }
    if s.read_only {
        args.push("--read-only".into());
    }

    // VFS cache
    args.push("--vfs-cache-mode".into());
    args.push(v.cache_mode.to_string());
    if !v.cache_max_size.trim().is_empty() {
        args.push("--vfs-cache-max-size".into());
        args.push(v.cache_max_size.trim().to_string());
    }
    if let Some(age) = v.cache_max_age.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        args.push("--vfs-cache-max-age".into());
        args.push(age.to_string());
    }
    if v.cache_max_files > 0 {
        args.push("--vfs-cache-max-files".into());
        args.push(v.cache_max_files.to_string());
    }
    args.push("--dir-cache-time".into());
    args.push(format!("{}m", v.dir_cache_time_minutes));
    if v.poll_interval_secs > 0 {
        args.push("--poll-interval".into());
        args.push(format!("{}s", v.poll_interval_secs));
    }

    // Performance
    if !v.buffer_size.trim().is_empty() {
        args.push("--buffer-size".into());
        args.push(v.buffer_size.trim().to_string());
    }
    if !v.chunk_size.trim().is_empty() {
        args.push("--vfs-read-chunk-size".into());
        args.push(v.chunk_size.trim().to_string());
    }
    args.push("--transfers".into());
    args.push(v.transfers.to_string());
    args.push("--checkers".into());
    args.push(v.checkers.to_string());

    // Advanced
    if v.async_read {
        args.push("--vfs-read-wait".into());
        args.push("0".into());
    }
    if v.async_write {
        args.push("--vfs-write-wait".into());
        args.push("0".into());
    }
    let umask = v.umask.trim();
    if !umask.is_empty() && umask != "000" {
        args.push("--umask".into());
        args.push(umask.to_string());
    }
    if v.uid > 0 {
        args.push("--uid".into());
        args.push(v.uid.to_string());
    }
    if v.gid > 0 {
        args.push("--gid".into());
        args.push(v.gid.to_string());
    }

    // Baseline
    args.push("--vfs-cache-poll-interval".into());
    args.push("1m".into());
    args.push("--log-level".into());
    args.push("INFO".into());

    args
}

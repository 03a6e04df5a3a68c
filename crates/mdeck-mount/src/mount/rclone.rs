//! rclone executable resolution and one-shot commands.

use crate::mount::error::{MountError, MountResult};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// `CREATE_NO_WINDOW`, keeps console windows from flashing up.
#[cfg(target_os = "windows")]
pub const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[cfg(target_os = "windows")]
const RCLONE_EXE: &str = "rclone.exe";
#[cfg(not(target_os = "windows"))]
const RCLONE_EXE: &str = "rclone";

/// Captured result of a finished rclone command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcloneOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RcloneOutput {
    /// Best human-readable failure text.
    pub fn error_message(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.lines().last().unwrap_or(err).trim().to_string();
        }
        match self.code {
            Some(c) => format!("exit code {}", c),
            None => "terminated".into(),
        }
    }
}

/// Runs rclone with this application's config file and cache directory.
#[derive(Debug, Clone)]
pub struct RcloneRunner {
    binary: PathBuf,
    config_file: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    command_timeout: Duration,
}

impl RcloneRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_file: None,
            cache_dir: None,
            command_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn with_cache_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Resolve the rclone executable: a configured path that exists, then
    /// one bundled next to the application, then `PATH`.
    pub fn locate(custom: Option<&str>) -> MountResult<PathBuf> {
        if let Some(p) = custom.map(str::trim).filter(|p| !p.is_empty()) {
            let path = PathBuf::from(p);
            if path.is_file() {
                return Ok(path);
            }
            log::warn!("Configured rclone path {} does not exist, searching", p);
        }

        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            for candidate in [dir.join("rclone").join(RCLONE_EXE), dir.join(RCLONE_EXE)] {
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }

        which::which("rclone").map_err(|_| MountError::BinaryNotFound)
    }

    /// A command for `rclone <args>` with the environment applied.
    pub fn command<I, S>(&self, args: I) -> tokio::process::Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = tokio::process::Command::new(&self.binary);
        cmd.args(args);
        if let Some(cfg) = &self.config_file {
            cmd.env("RCLONE_CONFIG", cfg);
        }
        if let Some(cache) = &self.cache_dir {
            cmd.env("RCLONE_CACHE_DIR", cache);
        }
        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW);
        cmd
    }

    /// Run to completion, killing the process after `timeout`.
    pub async fn run(&self, args: &[String], timeout: Duration) -> MountResult<RcloneOutput> {
        self.run_with_stdin(args, None, timeout).await
    }

    async fn run_with_stdin(
        &self,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> MountResult<RcloneOutput> {
        let label = args.first().cloned().unwrap_or_default();
        debug!("rclone {}", label);

        let mut cmd = self.command(args);
        cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(text.as_bytes()).await?;
            pipe.write_all(b"\n").await?;
            drop(pipe);
        }

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| MountError::CommandTimedOut(label))??;

        Ok(RcloneOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked(&self, args: &[String], timeout: Duration) -> MountResult<RcloneOutput> {
        let out = self.run(args, timeout).await?;
        if out.success {
            Ok(out)
        } else {
            let command = args.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
            Err(MountError::rclone(command, out.error_message()))
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// First line of `rclone version`, e.g. `rclone v1.66.0`.
    pub async fn version(&self) -> MountResult<String> {
        let out = self
            .run_checked(&["version".to_string()], self.command_timeout)
            .await?;
        Ok(parse_version(&out.stdout).unwrap_or_else(|| "Unknown".into()))
    }

    /// Obscure a secret for the rclone config. The plaintext goes over
    /// stdin, never on the command line.
    pub async fn obscure(&self, plaintext: &str) -> MountResult<String> {
        let args = ["obscure".to_string(), "-".to_string()];
        let out = self
            .run_with_stdin(&args, Some(plaintext), self.command_timeout)
            .await?;
        if !out.success {
            return Err(MountError::rclone("obscure", out.error_message()));
        }
        Ok(out.stdout.trim().to_string())
    }

    /// Create or overwrite the remote `name`. Secret values must already
    /// be obscured.
    pub async fn create_remote(
        &self,
        name: &str,
        backend: &str,
        params: &[(&str, String)],
    ) -> MountResult<()> {
        let args = config_create_args(name, backend, params);
        self.run_checked(&args, self.command_timeout).await?;
        info!("rclone remote '{}' ({}) configured", name, backend);
        Ok(())
    }

    pub async fn delete_remote(&self, name: &str) -> MountResult<()> {
        let args = vec!["config".to_string(), "delete".to_string(), name.to_string()];
        self.run_checked(&args, self.command_timeout).await?;
        info!("rclone remote '{}' deleted", name);
        Ok(())
    }

    /// `rclone lsd <remote_spec> --max-depth 1`.
    pub async fn list_dirs(&self, remote_spec: &str, timeout: Duration) -> MountResult<RcloneOutput> {
        let args = vec![
            "lsd".to_string(),
            remote_spec.to_string(),
            "--max-depth".to_string(),
            "1".to_string(),
        ];
        self.run_checked(&args, timeout).await
    }
}

/// Arguments for `rclone config create`.
pub fn config_create_args(name: &str, backend: &str, params: &[(&str, String)]) -> Vec<String> {
    let mut args = vec![
        "config".to_string(),
        "create".to_string(),
        name.to_string(),
        backend.to_string(),
    ];
    for (k, v) in params {
        args.push(format!("{}={}", k, v));
    }
    // Secrets are obscured by us already.
    args.push("--no-obscure".into());
    args
}

/// First non-empty line of `rclone version` output.
pub fn parse_version(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

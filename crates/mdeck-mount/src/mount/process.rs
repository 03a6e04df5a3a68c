//! Mount process lifecycle – spawn, supervise, kill, find-by-target.

use log::debug;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch, Mutex};

/// Upper bound on captured stderr, older output is kept.
const STDERR_LIMIT: usize = 64 * 1024;

/// How long the reaper waits for the stderr reader after exit.
const STDERR_DRAIN: Duration = Duration::from_millis(500);

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExitInfo {
    /// `None` when killed by a signal or the status could not be read.
    pub code: Option<i32>,
    pub success: bool,
}

impl ExitInfo {
    pub fn describe(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated".into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Process handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Handle on a long-running mount process.
///
/// A background reaper task owns the child. Kill requests are sent to it
/// over a channel and the exit status is published through a watch
/// channel, so any number of callers can wait for exit while another one
/// kills. Dropping the last handle kills the process.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    exit: watch::Receiver<Option<ExitInfo>>,
    kill_tx: mpsc::UnboundedSender<()>,
    stderr: Arc<Mutex<String>>,
}

impl ProcessHandle {
    /// Spawn `command` with stdin/stdout discarded and stderr captured.
    pub fn spawn(mut command: tokio::process::Command) -> std::io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = command.spawn()?;
        let pid = child.id();

        let stderr = Arc::new(Mutex::new(String::new()));
        let reader = child.stderr.take().map(|pipe| {
            let buf = stderr.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(pipe).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("rclone[{}]: {}", pid.unwrap_or(0), line);
                    let mut b = buf.lock().await;
                    if b.len() + line.len() < STDERR_LIMIT {
                        b.push_str(&line);
                        b.push('\n');
                    }
                }
            })
        });

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();

        tokio::spawn(async move {
            let status = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    req = kill_rx.recv() => {
                        let _ = child.start_kill();
                        if req.is_none() {
                            // Every handle is gone; nobody else can kill it.
                            break child.wait().await;
                        }
                    }
                }
            };
            if let Some(task) = reader {
                let _ = tokio::time::timeout(STDERR_DRAIN, task).await;
            }
            let info = match status {
                Ok(s) => ExitInfo {
                    code: s.code(),
                    success: s.success(),
                },
                Err(_) => ExitInfo::default(),
            };
            debug!("process {:?} exited: {}", pid, info.describe());
            let _ = exit_tx.send(Some(info));
        });

        Ok(Self {
            pid,
            exit: exit_rx,
            kill_tx,
            stderr,
        })
    }

    /// A handle driven by the returned [`SimulatedProcess`] instead of an
    /// OS process. Used when exercising the engine without rclone.
    pub fn simulated(pid: u32) -> (Self, SimulatedProcess) {
        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, mut kill_rx) = mpsc::unbounded_channel::<()>();
        let sim = SimulatedProcess {
            exit_tx: Arc::new(exit_tx),
            stderr: Arc::new(Mutex::new(String::new())),
            kills: Arc::new(AtomicUsize::new(0)),
            ignore_kill: Arc::new(AtomicBool::new(false)),
        };

        let task_sim = sim.clone();
        tokio::spawn(async move {
            while kill_rx.recv().await.is_some() {
                task_sim.kills.fetch_add(1, Ordering::SeqCst);
                if !task_sim.ignore_kill.load(Ordering::SeqCst) {
                    task_sim.finish(None);
                }
            }
        });

        let handle = Self {
            pid: Some(pid),
            exit: exit_rx,
            kill_tx,
            stderr: sim.stderr.clone(),
        };
        (handle, sim)
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit.borrow().clone()
    }

    /// Resolve once the process has exited.
    pub async fn wait(&self) -> ExitInfo {
        let mut rx = self.exit.clone();
        let info = match rx.wait_for(Option::is_some).await {
            Ok(info) => info.clone().unwrap_or_default(),
            // Reaper gone without reporting: the child is gone too.
            Err(_) => ExitInfo::default(),
        };
        info
    }

    /// Request a forceful kill. Returns immediately.
    pub fn kill(&self) {
        let _ = self.kill_tx.send(());
    }

    /// Kill and wait up to `grace` for the exit. `false` on timeout.
    pub async fn kill_and_wait(&self, grace: Duration) -> bool {
        if self.has_exited() {
            return true;
        }
        self.kill();
        tokio::time::timeout(grace, self.wait()).await.is_ok()
    }

    /// Stderr captured so far.
    pub async fn stderr(&self) -> String {
        self.stderr.lock().await.clone()
    }

    /// Last non-empty stderr line, the usual place rclone puts its error.
    pub async fn last_error_line(&self) -> Option<String> {
        self.stderr
            .lock()
            .await
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }
}

/// Controller for a [`ProcessHandle::simulated`] handle.
#[derive(Debug, Clone)]
pub struct SimulatedProcess {
    exit_tx: Arc<watch::Sender<Option<ExitInfo>>>,
    stderr: Arc<Mutex<String>>,
    kills: Arc<AtomicUsize>,
    ignore_kill: Arc<AtomicBool>,
}

impl SimulatedProcess {
    /// Make the process exit with `code` (`None` = killed by signal).
    pub fn finish(&self, code: Option<i32>) {
        self.exit_tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(ExitInfo {
                code,
                success: code == Some(0),
            });
            true
        });
    }

    pub async fn write_stderr(&self, text: &str) {
        let mut b = self.stderr.lock().await;
        b.push_str(text);
        if !text.ends_with('\n') {
            b.push('\n');
        }
    }

    /// Keep running when killed.
    pub fn set_ignore_kill(&self, ignore: bool) {
        self.ignore_kill.store(ignore, Ordering::SeqCst);
    }

    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    pub fn has_exited(&self) -> bool {
        self.exit_tx.borrow().is_some()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Process table
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command_line: String,
}

/// Enumerate and terminate processes we did not spawn ourselves.
#[async_trait::async_trait]
pub trait ProcessTable: Send + Sync {
    async fn list(&self) -> std::io::Result<Vec<ProcessInfo>>;
    async fn terminate(&self, pid: u32) -> std::io::Result<()>;
}

/// OS process table via `powershell Get-CimInstance` / `ps`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessTable;

#[async_trait::async_trait]
impl ProcessTable for SystemProcessTable {
    async fn list(&self) -> std::io::Result<Vec<ProcessInfo>> {
        #[cfg(target_os = "windows")]
        let output = {
            let mut cmd = tokio::process::Command::new("powershell");
            cmd.args([
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "Get-CimInstance Win32_Process -Filter \"Name='rclone.exe'\" | \
                 ForEach-Object { \"$($_.ProcessId)`t$($_.CommandLine)\" }",
            ]);
            cmd.creation_flags(crate::mount::rclone::CREATE_NO_WINDOW);
            cmd.output().await?
        };
        #[cfg(not(target_os = "windows"))]
        let output = tokio::process::Command::new("ps")
            .args(["-eo", "pid=,args="])
            .output()
            .await?;

        Ok(parse_process_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn terminate(&self, pid: u32) -> std::io::Result<()> {
        #[cfg(target_os = "windows")]
        let status = {
            let mut cmd = tokio::process::Command::new("taskkill");
            cmd.args(["/PID", &pid.to_string(), "/F"]);
            cmd.creation_flags(crate::mount::rclone::CREATE_NO_WINDOW);
            cmd.status().await?
        };
        #[cfg(not(target_os = "windows"))]
        let status = tokio::process::Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(std::io::Error::other(format!("could not terminate pid {}", pid)))
        }
    }
}

/// Parse `<pid><whitespace><command line>` lines.
pub fn parse_process_list(text: &str) -> Vec<ProcessInfo> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, rest) = line.split_once(|c: char| c.is_whitespace())?;
            Some(ProcessInfo {
                pid: pid.parse().ok()?,
                command_line: rest.trim().to_string(),
            })
        })
        .collect()
}

// ── Command-line matching ───────────────────────────────────────────

/// Split a command line into arguments, honouring double quotes.
pub fn split_command_line(cmd: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut has_token = false;
    for c in cmd.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    out.push(std::mem::take(&mut cur));
                    has_token = false;
                }
            }
            c => {
                cur.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        out.push(cur);
    }
    out
}

fn is_rclone_exe(token: &str) -> bool {
    let file = token.rsplit(['/', '\\']).next().unwrap_or(token);
    let stem = file
        .strip_suffix(".exe")
        .or_else(|| file.strip_suffix(".EXE"))
        .unwrap_or(file);
    stem.eq_ignore_ascii_case("rclone")
}

/// `rclone mount` flags that take no value.
const SWITCHES: &[&str] = &[
    "--network-mode",
    "--read-only",
    "--allow-other",
    "--allow-root",
    "--allow-non-empty",
    "--daemon",
    "--debug-fuse",
    "--no-modtime",
    "--no-checksum",
    "--no-seek",
    "--vfs-case-insensitive",
    "--vfs-fast-fingerprint",
    "-v",
    "-vv",
    "-q",
];

/// Positional arguments after `mount`, with flags and their values
/// removed.
fn mount_positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = args.iter().skip_while(|a| a.as_str() != "mount").skip(1);
    while let Some(arg) = rest.next() {
        if arg.len() > 1 && arg.starts_with('-') {
            if !arg.contains('=') && !SWITCHES.contains(&arg.as_str()) {
                rest.next();
            }
            continue;
        }
        out.push(arg.as_str());
    }
    out
}

/// Whether `command_line` is an `rclone mount` whose mount point (the
/// second positional argument) is exactly `target`. Compared whole, so
/// `D:` never matches `D:\sub`, and flag values such as `--cache-dir Z:`
/// are not mount points.
pub fn targets_mount_point(command_line: &str, target: &str) -> bool {
    let tokens = split_command_line(command_line);
    let Some((exe, args)) = tokens.split_first() else {
        return false;
    };
    if !is_rclone_exe(exe) || !args.iter().any(|a| a == "mount") {
        return false;
    }
    let Some(mount_point) = mount_positionals(args).get(1).copied() else {
        return false;
    };
    let target = target.trim_end_matches(['\\', '/']);
    let mount_point = mount_point.trim_end_matches(['\\', '/']);
    mount_point == target || (target.len() == 2 && mount_point.eq_ignore_ascii_case(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_handles_quotes() {
        let t = split_command_line(r#""C:\Program Files\rclone\rclone.exe" mount "sftp_ab:/my dir" Z: --volname "My Box""#);
        assert_eq!(
            t,
            vec![
                r"C:\Program Files\rclone\rclone.exe",
                "mount",
                "sftp_ab:/my dir",
                "Z:",
                "--volname",
                "My Box"
            ]
        );
        assert_eq!(split_command_line(r#"a "" b"#), vec!["a", "", "b"]);
    }

    #[test]
    fn exact_token_matching() {
        let d = r"rclone.exe mount sftp_x:/ D: --network-mode";
        let sub = r"rclone.exe mount sftp_x:/ D:\sub";
        assert!(targets_mount_point(d, "D:"));
        assert!(targets_mount_point(d, "d:"));
        assert!(!targets_mount_point(sub, "D:"));
        assert!(!targets_mount_point(d, "E:"));
        // Volume names or remotes that merely contain the letter do not count.
        assert!(!targets_mount_point(r#"rclone mount D:remote:/ Z: --volname "D: drive""#, "D:"));
    }

    #[test]
    fn only_the_positional_mount_point_counts() {
        let cached = r"rclone.exe mount sftp_x:/ Y: --cache-dir Z: --network-mode";
        assert!(!targets_mount_point(cached, "Z:"));
        assert!(targets_mount_point(cached, "Y:"));

        assert!(targets_mount_point(r#"rclone mount --volname "Box" sftp_x:/ Z:"#, "Z:"));
        assert!(targets_mount_point("rclone mount --read-only sftp_x:/ Z:", "Z:"));
        assert!(targets_mount_point("rclone mount --log-level=INFO ftp_a:/ /mnt/Z", "/mnt/Z"));
        assert!(!targets_mount_point("rclone mount --volname Z: ftp_a:/ Y:", "Z:"));
        assert!(!targets_mount_point("rclone mount ftp_a:/", "ftp_a:/"));
    }

    #[test]
    fn requires_rclone_mount() {
        assert!(!targets_mount_point("notepad.exe Z:", "Z:"));
        assert!(!targets_mount_point("rclone lsd Z:", "Z:"));
        assert!(targets_mount_point("/usr/bin/rclone mount ftp_a:/ /mnt/Z", "/mnt/Z"));
        assert!(!targets_mount_point("/usr/bin/rclone mount ftp_a:/ /mnt/Z", "/mnt/Y"));
    }

    #[test]
    fn parses_ps_output() {
        let out = "  101 /usr/bin/rclone mount a:/ /mnt/Z\n\n  7 bash\ngarbage\n";
        let list = parse_process_list(out);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].pid, 101);
        assert_eq!(list[0].command_line, "/usr/bin/rclone mount a:/ /mnt/Z");
        assert_eq!(list[1].command_line, "bash");
    }

    #[tokio::test]
    async fn simulated_kill_and_wait() {
        let (handle, sim) = ProcessHandle::simulated(42);
        assert_eq!(handle.pid(), Some(42));
        assert!(!handle.has_exited());
        assert!(handle.kill_and_wait(Duration::from_secs(1)).await);
        assert_eq!(sim.kill_count(), 1);
        assert_eq!(handle.exit_info().map(|i| i.code), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_kill_ignored_times_out() {
        let (handle, sim) = ProcessHandle::simulated(7);
        sim.set_ignore_kill(true);
        assert!(!handle.kill_and_wait(Duration::from_secs(3)).await);
        assert!(!handle.has_exited());
        sim.finish(Some(1));
        assert_eq!(handle.wait().await.code, Some(1));
    }

    #[tokio::test]
    async fn simulated_stderr_tail() {
        let (handle, sim) = ProcessHandle::simulated(1);
        sim.write_stderr("NOTICE: starting").await;
        sim.write_stderr("ERROR : mount failed: cannot find winfsp").await;
        assert_eq!(
            handle.last_error_line().await.as_deref(),
            Some("ERROR : mount failed: cannot find winfsp")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_exit_is_observed() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.args(["-c", "echo boom >&2; exit 3"]);
        let handle = ProcessHandle::spawn(cmd).unwrap();
        let info = handle.wait().await;
        assert_eq!(info.code, Some(3));
        assert!(!info.success);
        assert_eq!(handle.last_error_line().await.as_deref(), Some("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_process_kill() {
        let mut cmd = tokio::process::Command::new("sleep");
        cmd.arg("30");
        let handle = ProcessHandle::spawn(cmd).unwrap();
        assert!(handle.kill_and_wait(Duration::from_secs(5)).await);
        assert!(handle.has_exited());
    }
}

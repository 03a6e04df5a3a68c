#![allow(dead_code)]

use mdeck_mount::mount::*;
use mdeck_settings::settings::{
    Connection, DriveLetter, FtpConnection, GlobalVfsSettings, Protocol, SettingsProvider,
    SftpConnection, VfsOptions,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn letter(c: char) -> DriveLetter {
    DriveLetter::new(c).unwrap()
}

pub fn sftp(name: &str) -> Connection {
    SftpConnection::new(name, "files.example.net", "deploy").into()
}

pub fn ftp(name: &str) -> Connection {
    FtpConnection::new(name, "ftp.example.net").into()
}

// ── Settings ────────────────────────────────────────────────────────

pub struct FakeSettings {
    pub connections: Mutex<Vec<Connection>>,
    pub global: Mutex<GlobalVfsSettings>,
    pub auto_mount: AtomicBool,
    pub unmount_on_close: AtomicBool,
    pub notifications: AtomicBool,
}

impl Default for FakeSettings {
    fn default() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            global: Mutex::new(GlobalVfsSettings::default()),
            auto_mount: AtomicBool::new(true),
            unmount_on_close: AtomicBool::new(true),
            notifications: AtomicBool::new(true),
        }
    }
}

#[async_trait::async_trait]
impl SettingsProvider for FakeSettings {
    async fn list_connections(&self, protocol: Protocol) -> Vec<Connection> {
        self.connections
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.protocol() == protocol)
            .cloned()
            .collect()
    }
    async fn global_defaults(&self) -> GlobalVfsSettings {
        self.global.lock().unwrap().clone()
    }
    async fn auto_mount_enabled(&self) -> bool {
        self.auto_mount.load(Ordering::SeqCst)
    }
    async fn unmount_on_close_enabled(&self) -> bool {
        self.unmount_on_close.load(Ordering::SeqCst)
    }
    async fn notifications_enabled(&self) -> bool {
        self.notifications.load(Ordering::SeqCst)
    }
}

// ── Drives ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProbe {
    pub used: Mutex<HashSet<DriveLetter>>,
    /// How long a letter scan takes.
    pub scan_delay: Mutex<Duration>,
}

impl FakeProbe {
    /// Every letter except `free` is taken.
    pub fn with_free(free: &[char]) -> Self {
        let used = DriveLetter::all()
            .filter(|l| !free.contains(&l.as_char()))
            .collect();
        Self {
            used: Mutex::new(used),
            scan_delay: Mutex::new(Duration::ZERO),
        }
    }
}

#[async_trait::async_trait]
impl DriveProbe for FakeProbe {
    async fn used_letters(&self) -> HashSet<DriveLetter> {
        let delay = *self.scan_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.used.lock().unwrap().clone()
    }
    async fn is_reachable(&self, _letter: DriveLetter) -> bool {
        true
    }
    fn mount_target(&self, letter: DriveLetter) -> String {
        format!("{}:", letter)
    }
}

// ── Adapter ─────────────────────────────────────────────────────────

/// Adapter backed by simulated processes.
pub struct FakeAdapter {
    protocol: Protocol,
    pub delay: Duration,
    /// Connection names whose mount fails.
    pub fail_mount: Mutex<HashSet<String>>,
    /// Letters whose find-and-kill unmount fails. Otherwise it kills
    /// whatever process was launched at the letter.
    pub fail_unmount: Mutex<HashSet<DriveLetter>>,
    /// Launched processes still stubborn after a kill.
    pub ignore_kill: AtomicBool,
    pub processes: Mutex<HashMap<DriveLetter, SimulatedProcess>>,
    pub seen_vfs: Mutex<Vec<VfsOptions>>,
    pub mount_calls: AtomicUsize,
    next_pid: AtomicU32,
}

impl FakeAdapter {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            delay: Duration::from_millis(100),
            fail_mount: Mutex::new(HashSet::new()),
            fail_unmount: Mutex::new(HashSet::new()),
            ignore_kill: AtomicBool::new(false),
            processes: Mutex::new(HashMap::new()),
            seen_vfs: Mutex::new(Vec::new()),
            mount_calls: AtomicUsize::new(0),
            next_pid: AtomicU32::new(1000),
        }
    }

    pub fn fail(&self, name: &str) {
        self.fail_mount.lock().unwrap().insert(name.to_string());
    }

    pub fn process(&self, letter: DriveLetter) -> SimulatedProcess {
        self.processes.lock().unwrap()[&letter].clone()
    }
}

#[async_trait::async_trait]
impl MountAdapter for FakeAdapter {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn ensure_remote(&self, _connection: &Connection) -> MountResult<()> {
        Ok(())
    }

    async fn delete_remote(&self, _connection: &Connection) -> MountResult<()> {
        Ok(())
    }

    async fn test_connection(&self, _connection: &Connection) -> MountResult<String> {
        Ok("Connection successful!".into())
    }

    async fn mount(
        &self,
        connection: &Connection,
        letter: DriveLetter,
        vfs: &VfsOptions,
    ) -> MountResult<ProcessHandle> {
        self.mount_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_vfs.lock().unwrap().push(vfs.clone());
        tokio::time::sleep(self.delay).await;

        if self.fail_mount.lock().unwrap().contains(connection.name()) {
            return Err(MountError::LaunchFailed("authentication failed".into()));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (handle, sim) = ProcessHandle::simulated(pid);
        sim.set_ignore_kill(self.ignore_kill.load(Ordering::SeqCst));
        self.processes.lock().unwrap().insert(letter, sim);
        Ok(handle)
    }

    async fn unmount(&self, letter: DriveLetter) -> MountResult<bool> {
        if self.fail_unmount.lock().unwrap().contains(&letter) {
            return Err(MountError::UnmountFailed(format!("access denied on {}:", letter)));
        }
        match self.processes.lock().unwrap().get(&letter) {
            Some(sim) if !sim.has_exited() => {
                sim.finish(None);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ── Notifications ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.title.clone())
            .collect()
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub manager: MountManagerState,
    pub settings: Arc<FakeSettings>,
    pub probe: Arc<FakeProbe>,
    pub sftp: Arc<FakeAdapter>,
    pub ftp: Arc<FakeAdapter>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_probe(FakeProbe::default())
    }

    pub fn with_probe(probe: FakeProbe) -> Self {
        Self::build(probe, FakeAdapter::new(Protocol::Sftp))
    }

    pub fn build(probe: FakeProbe, sftp: FakeAdapter) -> Self {
        let settings = Arc::new(FakeSettings::default());
        let probe = Arc::new(probe);
        let sftp = Arc::new(sftp);
        let ftp = Arc::new(FakeAdapter::new(Protocol::Ftp));
        let notifier = Arc::new(RecordingNotifier::default());
        let manager = MountManager::builder(settings.clone(), probe.clone())
            .adapter(sftp.clone())
            .adapter(ftp.clone())
            .notifier(notifier.clone())
            .build();
        Self {
            manager,
            settings,
            probe,
            sftp,
            ftp,
            notifier,
        }
    }
}

/// Drain whatever events are queued.
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<MountStatusChanged>) -> Vec<MountStatusChanged> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Wait for the next event for `id`.
pub async fn next_event_for(
    rx: &mut tokio::sync::broadcast::Receiver<MountStatusChanged>,
    id: &str,
) -> MountStatusChanged {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev.connection_id == id {
                return ev;
            }
        }
    })
    .await
    .unwrap()
}

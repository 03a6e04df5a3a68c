//! In-memory mount table.
//!
//! One entry per connection id. Every state transition happens under the
//! table's write lock and publishes its `MountStatusChanged` before the
//! lock is released, so events for one connection arrive in transition
//! order. Each mount attempt gets a generation number; late reports from
//! an older attempt are ignored.

use crate::mount::error::{MountError, MountResult};
use crate::mount::letters::available_letters;
use crate::mount::process::ProcessHandle;
use crate::mount::types::{MountStatus, MountStatusChanged, MountedDrive};
use chrono::Utc;
use mdeck_settings::settings::{Connection, DriveLetter};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

const EVENT_CAPACITY: usize = 256;

struct Entry {
    drive: MountedDrive,
    process: Option<Arc<ProcessHandle>>,
    generation: u64,
    adopted: bool,
}

/// Ticket for an in-flight mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountTicket {
    pub letter: DriveLetter,
    pub generation: u64,
}

/// Ticket for an in-flight unmount.
#[derive(Debug, Clone)]
pub struct UnmountTicket {
    pub drive: MountedDrive,
    pub process: Option<Arc<ProcessHandle>>,
    pub generation: u64,
    /// Another live entry holds the same letter.
    pub letter_shared: bool,
    /// The entry was registered through [`MountRegistry::adopt`].
    pub adopted: bool,
}

pub struct MountRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    events: broadcast::Sender<MountStatusChanged>,
    next_generation: AtomicU64,
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MountStatusChanged> {
        self.events.subscribe()
    }

    fn emit(
        &self,
        id: &str,
        old: MountStatus,
        new: MountStatus,
        letter: Option<DriveLetter>,
        error: Option<String>,
    ) {
        let _ = self.events.send(MountStatusChanged {
            connection_id: id.to_string(),
            old_status: old,
            new_status: new,
            drive_letter: letter,
            error_message: error,
            timestamp: Utc::now(),
        });
    }

    // ── Transitions ─────────────────────────────────────────────────

    /// Insert a `Mounting` entry and reserve a letter, atomically.
    ///
    /// `requested` is honoured only if neither the system (`system_used`)
    /// nor another live entry holds it; otherwise the first free letter
    /// (Z downwards) is taken. An `Error` entry for the same id is
    /// replaced.
    pub async fn begin_mount(
        &self,
        connection: &Connection,
        requested: Option<DriveLetter>,
        system_used: &HashSet<DriveLetter>,
    ) -> MountResult<MountTicket> {
        let id = connection.id();
        let mut entries = self.entries.write().await;

        let old_status = match entries.get(id).map(|e| e.drive.status) {
            Some(s) if s.in_flight() => return Err(MountError::AlreadyInProgress(id.to_string())),
            Some(MountStatus::Mounted) => return Err(MountError::AlreadyMounted(id.to_string())),
            Some(s) => s,
            None => MountStatus::Unmounted,
        };

        let held: HashSet<DriveLetter> = entries
            .iter()
            .filter(|(k, e)| k.as_str() != id && e.drive.status.holds_letter())
            .map(|(_, e)| e.drive.drive_letter)
            .collect();

        let letter = match requested {
            Some(l) if held.contains(&l) || system_used.contains(&l) => {
                return Err(MountError::DriveLetterInUse(l))
            }
            Some(l) => l,
            None => {
                let used: HashSet<DriveLetter> = held.union(system_used).copied().collect();
                available_letters(&used)
                    .into_iter()
                    .next()
                    .ok_or(MountError::NoDriveLetterAvailable)?
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(stale) = entries.remove(id).and_then(|e| e.process) {
            stale.kill();
        }
        entries.insert(
            id.to_string(),
            Entry {
                drive: MountedDrive {
                    connection_id: id.to_string(),
                    connection_name: connection.name().to_string(),
                    protocol: connection.protocol(),
                    drive_letter: letter,
                    status: MountStatus::Mounting,
                    last_error: None,
                    pid: None,
                    mounted_at: None,
                },
                process: None,
                generation,
                adopted: false,
            },
        );
        self.emit(id, old_status, MountStatus::Mounting, Some(letter), None);
        Ok(MountTicket { letter, generation })
    }

    /// Resolve a `Mounting` entry. Returns the new snapshot, or `None`
    /// when the ticket is stale.
    pub async fn finish_mount(
        &self,
        id: &str,
        generation: u64,
        outcome: Result<Arc<ProcessHandle>, String>,
    ) -> Option<MountedDrive> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(id)
            .filter(|e| e.generation == generation && e.drive.status == MountStatus::Mounting)?;

        match outcome {
            Ok(process) => {
                entry.drive.status = MountStatus::Mounted;
                entry.drive.pid = process.pid();
                entry.drive.mounted_at = Some(Utc::now());
                entry.process = Some(process);
                let letter = entry.drive.drive_letter;
                let snapshot = entry.drive.clone();
                self.emit(id, MountStatus::Mounting, MountStatus::Mounted, Some(letter), None);
                Some(snapshot)
            }
            Err(message) => {
                entry.drive.status = MountStatus::Error;
                entry.drive.last_error = Some(message.clone());
                let letter = entry.drive.drive_letter;
                let snapshot = entry.drive.clone();
                self.emit(id, MountStatus::Mounting, MountStatus::Error, Some(letter), Some(message));
                Some(snapshot)
            }
        }
    }

    /// Register a drive that is already mounted at `letter` but was not
    /// started by this table, e.g. one left behind by a previous run. The
    /// entry has no process handle; unmounting it goes through the
    /// adapter's find-by-letter path.
    pub async fn adopt(&self, connection: &Connection, letter: DriveLetter) -> MountResult<MountedDrive> {
        let id = connection.id();
        let mut entries = self.entries.write().await;

        let old_status = match entries.get(id).map(|e| e.drive.status) {
            Some(s) if s.in_flight() => return Err(MountError::AlreadyInProgress(id.to_string())),
            Some(MountStatus::Mounted) => return Err(MountError::AlreadyMounted(id.to_string())),
            Some(s) => s,
            None => MountStatus::Unmounted,
        };
        if Self::letter_held_by_other(&entries, id, letter) {
            return Err(MountError::DriveLetterInUse(letter));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(stale) = entries.remove(id).and_then(|e| e.process) {
            stale.kill();
        }
        let drive = MountedDrive {
            connection_id: id.to_string(),
            connection_name: connection.name().to_string(),
            protocol: connection.protocol(),
            drive_letter: letter,
            status: MountStatus::Mounted,
            last_error: None,
            pid: None,
            mounted_at: Some(Utc::now()),
        };
        entries.insert(
            id.to_string(),
            Entry {
                drive: drive.clone(),
                process: None,
                generation,
                adopted: true,
            },
        );
        self.emit(id, old_status, MountStatus::Mounted, Some(letter), None);
        Ok(drive)
    }

    fn letter_held_by_other(entries: &HashMap<String, Entry>, id: &str, letter: DriveLetter) -> bool {
        entries
            .iter()
            .any(|(k, e)| k.as_str() != id && e.drive.status.holds_letter() && e.drive.drive_letter == letter)
    }

    /// Move a `Mounted` or `Error` entry to `Unmounting`. `None` when no
    /// entry exists or an operation is already running.
    pub async fn begin_unmount(&self, id: &str) -> Option<UnmountTicket> {
        let mut entries = self.entries.write().await;
        let letter = entries
            .get(id)
            .filter(|e| !e.drive.status.in_flight())?
            .drive
            .drive_letter;
        let letter_shared = Self::letter_held_by_other(&entries, id, letter);
        let entry = entries.get_mut(id)?;

        let old = entry.drive.status;
        entry.drive.status = MountStatus::Unmounting;
        let ticket = UnmountTicket {
            drive: entry.drive.clone(),
            process: entry.process.clone(),
            generation: entry.generation,
            letter_shared,
            adopted: entry.adopted,
        };
        self.emit(id, old, MountStatus::Unmounting, Some(entry.drive.drive_letter), None);
        Some(ticket)
    }

    /// Resolve an `Unmounting` entry: remove it on success, park it in
    /// `Error` otherwise. Returns whether the entry was removed.
    pub async fn finish_unmount(&self, id: &str, generation: u64, outcome: Result<(), String>) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries
            .get_mut(id)
            .filter(|e| e.generation == generation && e.drive.status == MountStatus::Unmounting)
        else {
            return false;
        };
        let letter = entry.drive.drive_letter;

        match outcome {
            Ok(()) => {
                entries.remove(id);
                self.emit(id, MountStatus::Unmounting, MountStatus::Unmounted, Some(letter), None);
                true
            }
            Err(message) => {
                entry.drive.status = MountStatus::Error;
                entry.drive.last_error = Some(message.clone());
                self.emit(id, MountStatus::Unmounting, MountStatus::Error, Some(letter), Some(message));
                false
            }
        }
    }

    /// Supervisor report: the process of mount `generation` exited. Only
    /// a still-`Mounted` entry of that generation is moved to `Error`.
    pub async fn mark_exited(&self, id: &str, generation: u64) -> bool {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries
            .get_mut(id)
            .filter(|e| e.generation == generation && e.drive.status == MountStatus::Mounted)
        else {
            return false;
        };
        let message = MountError::UnexpectedTermination.to_string();
        entry.drive.status = MountStatus::Error;
        entry.drive.last_error = Some(message.clone());
        let letter = entry.drive.drive_letter;
        self.emit(id, MountStatus::Mounted, MountStatus::Error, Some(letter), Some(message));
        true
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get(&self, id: &str) -> Option<MountedDrive> {
        self.entries.read().await.get(id).map(|e| e.drive.clone())
    }

    pub async fn list(&self) -> Vec<MountedDrive> {
        let mut out: Vec<MountedDrive> =
            self.entries.read().await.values().map(|e| e.drive.clone()).collect();
        out.sort_by(|a, b| a.drive_letter.cmp(&b.drive_letter));
        out
    }

    /// Letters reserved by `Mounting`, `Mounted` or `Unmounting` entries.
    pub async fn held_letters(&self) -> HashSet<DriveLetter> {
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.drive.status.holds_letter())
            .map(|e| e.drive.drive_letter)
            .collect()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdeck_settings::settings::SftpConnection;

    fn conn(name: &str) -> Connection {
        SftpConnection::new(name, "h", "u").into()
    }

    fn letter(c: char) -> DriveLetter {
        DriveLetter::new(c).unwrap()
    }

    fn process() -> Arc<ProcessHandle> {
        Arc::new(ProcessHandle::simulated(99).0)
    }

    #[tokio::test]
    async fn second_begin_is_rejected_while_mounting() {
        let reg = MountRegistry::new();
        let c = conn("a");
        reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        assert!(matches!(
            reg.begin_mount(&c, None, &HashSet::new()).await,
            Err(MountError::AlreadyInProgress(_))
        ));
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn auto_letters_skip_live_entries_and_system() {
        let reg = MountRegistry::new();
        let used: HashSet<_> = [letter('Z')].into_iter().collect();
        let a = reg.begin_mount(&conn("a"), None, &used).await.unwrap();
        let b = reg.begin_mount(&conn("b"), None, &used).await.unwrap();
        assert_eq!(a.letter, letter('Y'));
        assert_eq!(b.letter, letter('X'));
    }

    #[tokio::test]
    async fn requested_letter_conflicts() {
        let reg = MountRegistry::new();
        let used: HashSet<_> = [letter('C')].into_iter().collect();
        assert!(matches!(
            reg.begin_mount(&conn("a"), Some(letter('C')), &used).await,
            Err(MountError::DriveLetterInUse(l)) if l == letter('C')
        ));
        reg.begin_mount(&conn("b"), Some(letter('M')), &used).await.unwrap();
        assert!(matches!(
            reg.begin_mount(&conn("c"), Some(letter('M')), &used).await,
            Err(MountError::DriveLetterInUse(_))
        ));
        // Nothing was inserted for the rejected attempts.
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn error_entries_free_their_letter_and_allow_retry() {
        let reg = MountRegistry::new();
        let c = conn("a");
        let t = reg.begin_mount(&c, Some(letter('Q')), &HashSet::new()).await.unwrap();
        reg.finish_mount(c.id(), t.generation, Err("boom".into())).await.unwrap();

        let other = reg.begin_mount(&conn("b"), Some(letter('Q')), &HashSet::new()).await;
        assert!(other.is_ok());

        let mut rx = reg.subscribe();
        let retry = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        assert!(retry.generation > t.generation);
        let ev = rx.recv().await.unwrap();
        assert_eq!((ev.old_status, ev.new_status), (MountStatus::Error, MountStatus::Mounting));
    }

    #[tokio::test]
    async fn stale_generation_is_ignored() {
        let reg = MountRegistry::new();
        let c = conn("a");
        let t = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        assert!(reg.finish_mount(c.id(), t.generation + 1, Ok(process())).await.is_none());
        let snap = reg.finish_mount(c.id(), t.generation, Ok(process())).await.unwrap();
        assert_eq!(snap.status, MountStatus::Mounted);
        assert_eq!(snap.pid, Some(99));

        assert!(!reg.mark_exited(c.id(), t.generation + 1).await);
        assert!(reg.mark_exited(c.id(), t.generation).await);
        let snap = reg.get(c.id()).await.unwrap();
        assert_eq!(snap.status, MountStatus::Error);
        assert_eq!(
            snap.last_error,
            Some(MountError::UnexpectedTermination.to_string())
        );
    }

    #[tokio::test]
    async fn unmount_ticket_reports_letter_reused_by_other_entry() {
        let reg = MountRegistry::new();
        let (a, b) = (conn("a"), conn("b"));
        let t = reg.begin_mount(&a, Some(letter('Z')), &HashSet::new()).await.unwrap();
        reg.finish_mount(a.id(), t.generation, Err("boom".into())).await.unwrap();
        let t = reg.begin_mount(&b, Some(letter('Z')), &HashSet::new()).await.unwrap();
        reg.finish_mount(b.id(), t.generation, Ok(process())).await.unwrap();

        let ticket = reg.begin_unmount(a.id()).await.unwrap();
        assert!(ticket.letter_shared);
        assert!(!ticket.adopted);
        assert!(ticket.process.is_none());

        let ticket = reg.begin_unmount(b.id()).await.unwrap();
        assert!(!ticket.letter_shared);
    }

    #[tokio::test]
    async fn adopt_registers_mounted_entry_without_process() {
        let reg = MountRegistry::new();
        let (a, b) = (conn("a"), conn("b"));
        let mut rx = reg.subscribe();
        let drive = reg.adopt(&a, letter('K')).await.unwrap();
        assert_eq!(drive.status, MountStatus::Mounted);
        assert_eq!(drive.pid, None);
        let ev = rx.recv().await.unwrap();
        assert_eq!((ev.old_status, ev.new_status), (MountStatus::Unmounted, MountStatus::Mounted));

        assert!(matches!(reg.adopt(&a, letter('J')).await, Err(MountError::AlreadyMounted(_))));
        assert!(matches!(
            reg.adopt(&b, letter('K')).await,
            Err(MountError::DriveLetterInUse(l)) if l == letter('K')
        ));
        assert!(reg.held_letters().await.contains(&letter('K')));

        let ticket = reg.begin_unmount(a.id()).await.unwrap();
        assert!(ticket.adopted);
        assert!(!ticket.letter_shared);
    }

    #[tokio::test]
    async fn unmount_lifecycle_and_events() {
        let reg = MountRegistry::new();
        let c = conn("a");
        let mut rx = reg.subscribe();
        let t = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        reg.finish_mount(c.id(), t.generation, Ok(process())).await.unwrap();

        assert!(reg.begin_unmount("missing").await.is_none());
        let ticket = reg.begin_unmount(c.id()).await.unwrap();
        assert!(ticket.process.is_some());
        // In flight: a second unmount is refused.
        assert!(reg.begin_unmount(c.id()).await.is_none());
        assert!(!reg.mark_exited(c.id(), t.generation).await);
        assert!(reg.finish_unmount(c.id(), ticket.generation, Ok(())).await);
        assert!(reg.is_empty().await);

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            seen.push(ev.new_status);
        }
        assert_eq!(
            seen,
            vec![
                MountStatus::Mounting,
                MountStatus::Mounted,
                MountStatus::Unmounting,
                MountStatus::Unmounted
            ]
        );
    }

    #[tokio::test]
    async fn failed_unmount_parks_in_error() {
        let reg = MountRegistry::new();
        let c = conn("a");
        let t = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        reg.finish_mount(c.id(), t.generation, Ok(process())).await.unwrap();
        let ticket = reg.begin_unmount(c.id()).await.unwrap();
        assert!(!reg.finish_unmount(c.id(), ticket.generation, Err("stuck".into())).await);
        let snap = reg.get(c.id()).await.unwrap();
        assert_eq!(snap.status, MountStatus::Error);
        assert_eq!(snap.last_error.as_deref(), Some("stuck"));
        // Unmount from Error is allowed.
        assert!(reg.begin_unmount(c.id()).await.is_some());
    }
}

//! Exit watcher for mounted processes.

use crate::mount::process::ProcessHandle;
use crate::mount::registry::MountRegistry;
use log::warn;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// Watch `process` and flag the entry when it exits on its own.
///
/// Holds the registry weakly so a dropped manager does not stay alive
/// through its watchers. An exit during a requested unmount is ignored by
/// the registry because the entry is no longer `Mounted`.
pub fn watch(
    registry: &Arc<MountRegistry>,
    connection_id: String,
    generation: u64,
    process: Arc<ProcessHandle>,
) -> JoinHandle<()> {
    let registry: Weak<MountRegistry> = Arc::downgrade(registry);
    tokio::spawn(async move {
        let exit = process.wait().await;
        let Some(registry) = registry.upgrade() else {
            return;
        };
        if registry.mark_exited(&connection_id, generation).await {
            let detail = process
                .last_error_line()
                .await
                .unwrap_or_else(|| exit.describe());
            warn!(
                "Mount process for {} (pid {:?}) terminated unexpectedly: {}",
                connection_id,
                process.pid(),
                detail
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::types::MountStatus;
    use mdeck_settings::settings::{Connection, SftpConnection};
    use std::collections::HashSet;

    #[tokio::test]
    async fn exit_while_mounted_moves_to_error() {
        let reg = Arc::new(MountRegistry::new());
        let c: Connection = SftpConnection::new("a", "h", "u").into();
        let t = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        let (handle, sim) = ProcessHandle::simulated(5);
        let handle = Arc::new(handle);
        reg.finish_mount(c.id(), t.generation, Ok(handle.clone())).await;

        let task = watch(&reg, c.id().to_string(), t.generation, handle);
        sim.finish(Some(1));
        task.await.unwrap();
        assert_eq!(reg.get(c.id()).await.unwrap().status, MountStatus::Error);
    }

    #[tokio::test]
    async fn exit_during_unmount_is_ignored() {
        let reg = Arc::new(MountRegistry::new());
        let c: Connection = SftpConnection::new("a", "h", "u").into();
        let t = reg.begin_mount(&c, None, &HashSet::new()).await.unwrap();
        let (handle, sim) = ProcessHandle::simulated(5);
        let handle = Arc::new(handle);
        reg.finish_mount(c.id(), t.generation, Ok(handle.clone())).await;
        reg.begin_unmount(c.id()).await.unwrap();

        let task = watch(&reg, c.id().to_string(), t.generation, handle);
        sim.finish(None);
        task.await.unwrap();
        assert_eq!(reg.get(c.id()).await.unwrap().status, MountStatus::Unmounting);
    }
}

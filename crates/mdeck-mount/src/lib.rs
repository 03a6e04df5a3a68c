//! # mdeck-mount
//!
//! Mount orchestration engine. Turns connection records into live drive
//! letters backed by `rclone mount` processes, supervises those processes
//! and reports every status transition.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | **types** | `MountStatus`, `MountedDrive` snapshots, status-changed events, timings |
//! | **error** | `MountError` taxonomy and result alias |
//! | **letters** | Drive-letter allocation and the `DriveProbe` system seam |
//! | **process** | Supervised child process handle, process table, command-line matching |
//! | **rclone** | rclone binary resolution and one-shot invocations |
//! | **args** | `rclone mount` argument builder |
//! | **adapter** | `MountAdapter` trait and the shared launch / readiness driver |
//! | **sftp** / **ftp** | Per-protocol adapters |
//! | **registry** | Concurrency-safe mount table and event bus |
//! | **supervisor** | Unexpected-exit watch per mount |
//! | **notify** | Desktop notification collaborator |
//! | **driver** | WinFsp / FUSE preflight detection |
//! | **service** | `MountManager` façade |

pub mod mount;

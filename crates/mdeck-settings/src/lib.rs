//! # mdeck-settings
//!
//! Persistence collaborator for the mount engine.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | **types** | Drive letters, protocols, application settings, export envelope |
//! | **connection** | SFTP / FTP connection records and the `Connection` sum type |
//! | **vfs** | Cache/performance options, global defaults, per-connection mount settings |
//! | **profiles** | Predefined VFS performance profiles |
//! | **validate** | Size / duration / umask validation for VFS options |
//! | **error** | `SettingsError` and result alias |
//! | **store** | JSON settings file, CRUD, export / import |
//! | **provider** | `SettingsProvider` trait consumed by the mount engine |

pub mod settings;

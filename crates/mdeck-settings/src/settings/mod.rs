//! Settings module root – re-exports public API surface.

pub mod types;
pub mod connection;
pub mod vfs;
pub mod profiles;
pub mod validate;
pub mod error;
pub mod store;
pub mod provider;

pub use types::*;
pub use connection::*;
pub use vfs::*;
pub use profiles::VfsPerformanceProfile;
pub use error::{SettingsError, SettingsResult};
pub use store::{ImportSummary, SettingsPaths, SettingsStore, SettingsStoreState};
pub use provider::SettingsProvider;

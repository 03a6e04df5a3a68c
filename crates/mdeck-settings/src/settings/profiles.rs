//! Predefined VFS performance profiles.

use crate::settings::vfs::{VfsCacheMode, VfsOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VfsPerformanceProfile {
    #[default]
    Default,
    FastStreaming,
    LargeFiles,
    LowMemory,
    ManySmallFiles,
    MaximumPerformance,
    /// User-edited values; applying it changes nothing.
    Custom,
}

impl VfsPerformanceProfile {
    pub const ALL: [VfsPerformanceProfile; 7] = [
        Self::Default,
        Self::FastStreaming,
        Self::LargeFiles,
        Self::LowMemory,
        Self::ManySmallFiles,
        Self::MaximumPerformance,
        Self::Custom,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Default => "Default (Balanced)",
            Self::FastStreaming => "Fast Streaming",
            Self::LargeFiles => "Large Files",
            Self::LowMemory => "Low Memory",
            Self::ManySmallFiles => "Many Small Files",
            Self::MaximumPerformance => "Maximum Performance",
            Self::Custom => "Custom",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Default => "Balanced settings suitable for most use cases",
            Self::FastStreaming => "Optimized for streaming media with large read-ahead buffers",
            Self::LargeFiles => "Optimized for transferring large files with big chunks",
            Self::LowMemory => "Conservative settings for systems with limited RAM",
            Self::ManySmallFiles => "Optimized for directories with thousands of small files",
            Self::MaximumPerformance => "Maximum speed with full caching and parallelism",
            Self::Custom => "User-defined custom settings",
        }
    }

    /// Overwrite the tunables in `opts` with this profile's values.
    /// Ownership fields are reset to `000` / 0. `Custom` is a no-op.
    pub fn apply_to(&self, opts: &mut VfsOptions) {
        let p = match self {
            Self::Default => Preset {
                mode: VfsCacheMode::Writes,
                max_size: "10G",
                max_age: None,
                dir_minutes: 5,
                poll_secs: 60,
                buffer: "16M",
                chunk: "64M",
                transfers: 4,
                checkers: 8,
                async_read: true,
                async_write: false,
            },
            Self::FastStreaming => Preset {
                mode: VfsCacheMode::Full,
                max_size: "50G",
                max_age: Some("168h"),
                dir_minutes: 60,
                poll_secs: 300,
                buffer: "64M",
                chunk: "256M",
                transfers: 8,
                checkers: 16,
                async_read: true,
                async_write: false,
            },
            Self::LargeFiles => Preset {
                mode: VfsCacheMode::Full,
                max_size: "100G",
                max_age: None,
                dir_minutes: 30,
                poll_secs: 120,
                buffer: "128M",
                chunk: "512M",
                transfers: 16,
                checkers: 32,
                async_read: true,
                async_write: false,
            },
            Self::LowMemory => Preset {
                mode: VfsCacheMode::Minimal,
                max_size: "1G",
                max_age: Some("24h"),
                dir_minutes: 2,
                poll_secs: 0,
                buffer: "4M",
                chunk: "16M",
                transfers: 2,
                checkers: 4,
                async_read: false,
                async_write: false,
            },
            Self::ManySmallFiles => Preset {
                mode: VfsCacheMode::Writes,
                max_size: "5G",
                max_age: Some("72h"),
                dir_minutes: 60,
                poll_secs: 60,
                buffer: "8M",
                chunk: "32M",
                transfers: 8,
                checkers: 64,
                async_read: true,
                async_write: false,
            },
            Self::MaximumPerformance => Preset {
                mode: VfsCacheMode::Full,
                max_size: "200G",
                max_age: None,
                dir_minutes: 120,
                poll_secs: 300,
                buffer: "256M",
                chunk: "1G",
                transfers: 32,
                checkers: 64,
                async_read: true,
                async_write: true,
            },
            Self::Custom => return,
        };
        p.write(opts);
    }
}

struct Preset {
    mode: VfsCacheMode,
    max_size: &'static str,
    max_age: Option<&'static str>,
    dir_minutes: u32,
    poll_secs: u32,
    buffer: &'static str,
    chunk: &'static str,
    transfers: u32,
    checkers: u32,
    async_read: bool,
    async_write: bool,
}

impl Preset {
    fn write(&self, opts: &mut VfsOptions) {
        opts.cache_mode = self.mode;
        opts.cache_max_size = self.max_size.to_string();
        opts.cache_max_age = self.max_age.map(str::to_string);
        opts.dir_cache_time_minutes = self.dir_minutes;
        opts.poll_interval_secs = self.poll_secs;
        opts.buffer_size = self.buffer.to_string();
        opts.chunk_size = self.chunk.to_string();
        opts.transfers = self.transfers;
        opts.checkers = self.checkers;
        opts.async_read = self.async_read;
        opts.async_write = self.async_write;
        opts.umask = "000".into();
        opts.uid = 0;
        opts.gid = 0;
    }
}

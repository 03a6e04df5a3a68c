//! Validation of user-editable VFS values before they reach rclone.

use crate::settings::error::{SettingsError, SettingsResult};
use crate::settings::vfs::VfsOptions;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `off`, or a number with an optional binary unit suffix (`10G`, `512M`, `1.5T`).
    static ref SIZE_RE: Regex = Regex::new(r"^(?i:off|\d+(\.\d+)?[bkmgtp]?)$").unwrap();
    /// `off`, or one or more number+unit groups (`72h`, `1h30m`, `500ms`).
    static ref DURATION_RE: Regex =
        Regex::new(r"^(off|(\d+(\.\d+)?(ms|s|m|h|d|w|M|y))+)$").unwrap();
    static ref UMASK_RE: Regex = Regex::new(r"^[0-7]{3,4}$").unwrap();
}

pub fn is_valid_size(s: &str) -> bool {
    SIZE_RE.is_match(s.trim())
}

pub fn is_valid_duration(s: &str) -> bool {
    DURATION_RE.is_match(s.trim())
}

pub fn is_valid_umask(s: &str) -> bool {
    UMASK_RE.is_match(s.trim())
}

/// Reject options rclone would refuse at mount time.
pub fn validate_vfs(opts: &VfsOptions) -> SettingsResult<()> {
    let sizes = [
        ("cacheMaxSize", &opts.cache_max_size),
        ("bufferSize", &opts.buffer_size),
        ("chunkSize", &opts.chunk_size),
    ];
    for (field, value) in sizes {
        if !is_valid_size(value) {
            return Err(SettingsError::invalid(field, format!("'{}' is not a size", value)));
        }
    }
    if let Some(age) = &opts.cache_max_age {
        if !is_valid_duration(age) {
            return Err(SettingsError::invalid(
                "cacheMaxAge",
                format!("'{}' is not a duration", age),
            ));
        }
    }
    if !is_valid_umask(&opts.umask) {
        return Err(SettingsError::invalid(
            "umask",
            format!("'{}' is not an octal mask", opts.umask),
        ));
    }
    if opts.transfers == 0 {
        return Err(SettingsError::invalid("transfers", "must be at least 1"));
    }
    if opts.checkers == 0 {
        return Err(SettingsError::invalid("checkers", "must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        for ok in ["10G", "512M", "1.5T", "off", "OFF", "1024", "64k"] {
            assert!(is_valid_size(ok), "{ok}");
        }
        for bad in ["", "G", "10GB", "-1G", "ten"] {
            assert!(!is_valid_size(bad), "{bad}");
        }
    }

    #[test]
    fn durations() {
        for ok in ["72h", "1h30m", "500ms", "168h", "off", "2w"] {
            assert!(is_valid_duration(ok), "{ok}");
        }
        for bad in ["", "h", "72", "3 days"] {
            assert!(!is_valid_duration(bad), "{bad}");
        }
    }

    #[test]
    fn umask() {
        assert!(is_valid_umask("000"));
        assert!(is_valid_umask("0022"));
        assert!(!is_valid_umask("888"));
        assert!(!is_valid_umask("22"));
    }

    #[test]
    fn validate_vfs_defaults_pass() {
        assert!(validate_vfs(&VfsOptions::default()).is_ok());
    }

    #[test]
    fn validate_vfs_reports_field() {
        let opts = VfsOptions {
            transfers: 0,
            ..Default::default()
        };
        match validate_vfs(&opts) {
            Err(SettingsError::Invalid { field, .. }) => assert_eq!(field, "transfers"),
            other => panic!("unexpected {:?}", other),
        }

        let opts = VfsOptions {
            cache_max_age: Some("forever".into()),
            ..Default::default()
        };
        assert!(validate_vfs(&opts).is_err());
    }
}

//! Process-wide log subscriber.
//!
//! Library crates log through `log`; the `tracing-log` bridge forwards
//! those records into the subscriber installed here.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Set to `json` for one JSON object per line.
pub const LOG_FORMAT_ENV: &str = "MOUNTDECK_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else falls back to the
    /// build default.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            Some(v) if v.eq_ignore_ascii_case("text") => Self::Text,
            _ => Self::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(feature = "logs-json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default
/// `info` filter. Calling twice is harmless.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    if result.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing() {
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" text ")), LogFormat::Text);
        assert_eq!(LogFormat::parse(Some("yaml")), LogFormat::default());
        assert_eq!(LogFormat::parse(None), LogFormat::default());
    }

    #[test]
    fn init_twice_does_not_panic() {
        init();
        init();
    }
}

//! Logging setup shared by the CLI and embedders

use crate::config::LoggingSettings;
use tracing_subscriber::{fmt, EnvFilter};

/// Build the default filter directive for `level`
pub fn filter_directive(level: &str) -> String {
    format!("lminet={},liblminet={},lminetctl={}", level, level, level)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this twice
/// is harmless; the second installation is ignored.
pub fn init(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&settings.level)));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.with_ansi(atty::is(atty::Stream::Stdout)).try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive_covers_all_targets() {
        let directive = filter_directive("debug");
        assert!(directive.contains("liblminet=debug"));
        assert!(directive.contains("lminetctl=debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let settings = LoggingSettings::default();
        init(&settings);
        init(&settings);
    }
}

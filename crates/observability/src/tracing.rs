//! Tracing/logging initialization.
//!
//! JSON lines to stdout. `RUST_LOG` wins over the configured default level.

use tracing_subscriber::EnvFilter;

/// Filter from `RUST_LOG`, falling back to `default_level`, then to `info`
/// if the directive does not parse.
pub fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn init(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();

    ::tracing::debug!(default_level, "tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init("debug");
        init("warn");
    }

    #[test]
    fn unparsable_default_still_builds_a_filter() {
        let _ = filter("not a [valid directive");
    }
}

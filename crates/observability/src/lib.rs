//! Process-wide logging setup shared by the binaries.

/// Initialize tracing with `default_level` as the filter when `RUST_LOG` is unset.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init(default_level: &str) {
    tracing::init(default_level);
}

/// Subscriber construction (filters, formatting).
pub mod tracing;

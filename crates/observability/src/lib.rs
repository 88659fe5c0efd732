//! Process-wide tracing setup.

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

pub use self::tracing::LogFormat;

/// Subscriber configuration (filters, output format).
pub mod tracing;

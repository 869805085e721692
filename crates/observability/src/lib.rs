//! Tracing/logging setup for processes and tests that embed the bus.
//!
//! The bus crates only emit `tracing` events; installing a subscriber is left to the
//! embedding process.

/// Initialize process-wide tracing (JSON lines).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize tracing for tests (human-readable, captured by the test harness).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Subscriber construction (filters, formatters).
pub mod tracing;

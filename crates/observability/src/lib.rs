//! Tracing/logging setup shared by every cellarwatch binary.

/// Initialize process-wide logging for a named service.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(service: &'static str) {
    tracing::init(service);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

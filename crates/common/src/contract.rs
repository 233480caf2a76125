use std::fmt;

/// Report a broken caller contract: panics in debug builds, logs a warning
/// and returns in release builds so the caller can no-op.
pub fn contract_violation(message: fmt::Arguments<'_>) {
    if cfg!(debug_assertions) {
        panic!("{message}");
    }
    tracing::warn!("{message}; ignored");
}

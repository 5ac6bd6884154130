//! Utility functions and helpers

use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Strips the module path from a type name, keeping generic arguments intact.
///
/// `my_app::listeners::Audit` becomes `Audit`,
/// `my_app::Wrapper<my_app::Inner>` becomes `Wrapper<my_app::Inner>`.
pub fn short_type_name(full: &str) -> &str {
    let base_end = full.find('<').unwrap_or(full.len());
    let start = full[..base_end].rfind("::").map(|pos| pos + 2).unwrap_or(0);
    &full[start..]
}

use std::time::{SystemTime, UNIX_EPOCH};

/// Local wall-clock time in whole seconds since the epoch.
///
/// All protocol ages are measured against the local clock only; nothing in
/// the control plane compares timestamps taken on different nodes.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

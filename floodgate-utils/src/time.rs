use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current unix timestamp in seconds.
pub fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Whether a timestamp is older than `window_seconds` relative to `now`.
///
/// Used to drop replayed stream items that predate the policy window.
pub fn is_older_than(created_utc: u64, window_seconds: u64, now: u64) -> bool {
    created_utc < now.saturating_sub(window_seconds)
}

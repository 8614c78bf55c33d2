use chrono::Utc;

/// Wall-clock milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

use chrono::Utc;

/// Wall clock, unix ms.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

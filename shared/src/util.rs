/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current UTC time as Unix seconds
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

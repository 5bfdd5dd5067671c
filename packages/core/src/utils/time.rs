// Время в миллисекундах (так хранятся все timestamp сообщений)

use chrono::Utc;

/// Текущее время, Unix ms
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

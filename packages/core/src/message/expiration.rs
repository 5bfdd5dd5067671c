//! Per-conversation таймер исчезающих сообщений.
//!
//! Чистая модель: длительность (секунды) и момент старта (Unix ms).
//! Абсолютное время истечения всегда вычисляется из них и нигде не
//! хранится отдельно как источник истины.

use crate::message::kind::ExpirationEligibility;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationPolicy {
    expires_in_seconds: u32,
    expire_started_at: u64,
}

impl ExpirationPolicy {
    pub fn new(expires_in_seconds: u32, expire_started_at: u64) -> Self {
        Self {
            expires_in_seconds,
            expire_started_at,
        }
    }

    /// Беседа без таймера
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn expires_in_seconds(&self) -> u32 {
        self.expires_in_seconds
    }

    pub fn expire_started_at(&self) -> u64 {
        self.expire_started_at
    }

    pub fn has_per_conversation_expiration(&self) -> bool {
        self.expires_in_seconds > 0
    }

    pub fn has_expiration_started(&self) -> bool {
        self.expire_started_at > 0
    }

    /// Unix ms истечения; 0 пока таймер не настроен или не запущен
    pub fn expires_at(&self) -> u64 {
        if !self.has_per_conversation_expiration() || !self.has_expiration_started() {
            return 0;
        }
        self.expire_started_at
            .saturating_add(u64::from(self.expires_in_seconds) * 1000)
    }

    /// Сообщение уже должно исчезнуть к моменту `now`
    pub fn is_expired_at(&self, now: u64) -> bool {
        let expires_at = self.expires_at();
        expires_at > 0 && expires_at <= now
    }

    /// Числовая половина решения; вторую половину дает вариант сообщения
    pub fn should_start_expire_timer(&self, eligibility: ExpirationEligibility) -> bool {
        self.has_per_conversation_expiration() && eligibility.is_eligible()
    }

    /// Запомнить старт таймера. Повторный старт игнорируется.
    ///
    /// Возвращает `true`, если значение изменилось.
    pub fn update_started(&mut self, started_at: u64) -> bool {
        if self.has_expiration_started() || started_at == 0 {
            return false;
        }
        self.expire_started_at = started_at;
        true
    }
}

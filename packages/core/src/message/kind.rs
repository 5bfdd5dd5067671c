// Варианты сообщений и их право запускать таймер исчезновения

use crate::storage::models::MessageStatus;
use serde::{Deserialize, Serialize};

/// Системные сообщения внутри беседы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfoMessageKind {
    /// Изменение состава или настроек группы
    GroupUpdate,
    /// Изменение таймера исчезающих сообщений
    ExpirationTimerChanged,
    /// Сброс сессии шифрования
    SessionReset,
    /// Контакт обновил профиль
    ProfileUpdate,
}

/// Может ли вариант сообщения запустить таймер исчезновения
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationEligibility {
    /// Таймер может стартовать прямо сейчас
    Eligible,
    /// Станет Eligible позже (входящее еще не прочитано, исходящее не отправлено)
    Deferred,
    /// Этот вариант никогда не исчезает по таймеру
    Never,
}

impl ExpirationEligibility {
    pub fn is_eligible(self) -> bool {
        self == ExpirationEligibility::Eligible
    }
}

/// Закрытый набор вариантов сообщения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    Incoming {
        author_address: String,
        /// Unix ms прочтения; таймер входящего стартует при чтении
        read_at: Option<u64>,
    },
    Outgoing {
        status: MessageStatus,
    },
    Info(InfoMessageKind),
    /// Ошибка доставки или расшифровки, показанная в беседе
    Error,
}

impl MessageKind {
    pub fn incoming(author_address: impl Into<String>) -> Self {
        MessageKind::Incoming {
            author_address: author_address.into(),
            read_at: None,
        }
    }

    pub fn outgoing() -> Self {
        MessageKind::Outgoing {
            status: MessageStatus::Pending,
        }
    }

    /// Capability варианта: числовая половина решения лежит в ExpirationPolicy
    pub fn expiration_eligibility(&self) -> ExpirationEligibility {
        match self {
            MessageKind::Incoming { read_at, .. } => match read_at {
                Some(_) => ExpirationEligibility::Eligible,
                None => ExpirationEligibility::Deferred,
            },
            MessageKind::Outgoing { status } => match status {
                MessageStatus::Sent | MessageStatus::Delivered | MessageStatus::Read => {
                    ExpirationEligibility::Eligible
                }
                // Failed может быть отправлено повторно
                MessageStatus::Pending | MessageStatus::Failed => ExpirationEligibility::Deferred,
            },
            MessageKind::Info(kind) => match kind {
                InfoMessageKind::GroupUpdate => ExpirationEligibility::Eligible,
                InfoMessageKind::ExpirationTimerChanged
                | InfoMessageKind::SessionReset
                | InfoMessageKind::ProfileUpdate => ExpirationEligibility::Never,
            },
            MessageKind::Error => ExpirationEligibility::Never,
        }
    }

    /// Только пользовательские сообщения владеют вложениями и rich-контентом
    pub fn can_own_attachments(&self) -> bool {
        matches!(
            self,
            MessageKind::Incoming { .. } | MessageKind::Outgoing { .. }
        )
    }

    pub fn is_incoming(&self) -> bool {
        matches!(self, MessageKind::Incoming { .. })
    }

    pub fn is_outgoing(&self) -> bool {
        matches!(self, MessageKind::Outgoing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incoming_is_deferred_until_read() {
        let mut kind = MessageKind::incoming("alice");
        assert_eq!(kind.expiration_eligibility(), ExpirationEligibility::Deferred);

        if let MessageKind::Incoming { read_at, .. } = &mut kind {
            *read_at = Some(1_000);
        }
        assert_eq!(kind.expiration_eligibility(), ExpirationEligibility::Eligible);
    }

    #[test]
    fn test_outgoing_eligible_once_sent() {
        let pending = MessageKind::outgoing();
        assert_eq!(pending.expiration_eligibility(), ExpirationEligibility::Deferred);

        let failed = MessageKind::Outgoing {
            status: MessageStatus::Failed,
        };
        assert_eq!(failed.expiration_eligibility(), ExpirationEligibility::Deferred);

        for status in [MessageStatus::Sent, MessageStatus::Delivered, MessageStatus::Read] {
            let kind = MessageKind::Outgoing { status };
            assert!(kind.expiration_eligibility().is_eligible());
        }
    }

    #[test]
    fn test_system_messages() {
        assert!(MessageKind::Info(InfoMessageKind::GroupUpdate)
            .expiration_eligibility()
            .is_eligible());
        assert_eq!(
            MessageKind::Info(InfoMessageKind::ExpirationTimerChanged).expiration_eligibility(),
            ExpirationEligibility::Never
        );
        assert_eq!(MessageKind::Error.expiration_eligibility(), ExpirationEligibility::Never);

        assert!(!MessageKind::Error.can_own_attachments());
        assert!(!MessageKind::Info(InfoMessageKind::SessionReset).can_own_attachments());
        assert!(MessageKind::outgoing().can_own_attachments());
    }
}

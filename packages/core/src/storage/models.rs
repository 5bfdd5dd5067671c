// Модели данных для хранилища

use crate::config::Config;
use crate::message::content::{
    AttachmentId, ContactShare, LinkPreview, MessageBodyRanges, MessageSticker, QuotedMessage,
};
use crate::message::kind::MessageKind;
use serde::{Deserialize, Serialize};

/// Статус исходящего сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,   // Создано, но не отправлено
    Sent,      // Отправлено на сервер
    Delivered, // Доставлено получателю
    Read,      // Прочитано
    Failed,    // Ошибка отправки
}

/// Сообщение в хранилище (одна строка, все колонки)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub unique_id: String,
    pub conversation_id: String, // Группировка по беседе
    pub sort_id: u64,            // Назначается хранилищем при вставке
    pub timestamp: u64,
    pub received_at_timestamp: u64,
    pub kind: MessageKind,

    pub body: Option<String>,
    pub body_ranges: Option<MessageBodyRanges>,
    pub attachment_ids: Vec<AttachmentId>, // Только body-вложения, в исходном порядке
    pub quoted_message: Option<QuotedMessage>,
    pub quoted_thumbnail_id: Option<AttachmentId>,
    pub contact_share: Option<ContactShare>,
    pub contact_avatar_id: Option<AttachmentId>,
    pub link_preview: Option<LinkPreview>,
    pub link_preview_image_id: Option<AttachmentId>,
    pub message_sticker: Option<MessageSticker>,
    pub sticker_attachment_id: Option<AttachmentId>,

    pub expires_in_seconds: u32,
    pub expire_started_at: u64,
    pub expires_at: u64, // Денормализовано для индекса исчезающих сообщений
    pub stored_should_start_expire_timer: bool,

    pub is_view_once_message: bool,
    pub is_view_once_complete: bool,
    pub was_remotely_deleted: bool,
}

impl StoredMessage {
    /// Все id вложений из колонок строки, без декодирования в сообщение
    pub fn all_attachment_ids(&self) -> Vec<AttachmentId> {
        let mut ids = self.attachment_ids.clone();
        ids.extend(
            [
                &self.quoted_thumbnail_id,
                &self.contact_avatar_id,
                &self.link_preview_image_id,
                &self.sticker_attachment_id,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        ids
    }
}

/// Вложение в хранилище
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttachment {
    pub id: AttachmentId,
    pub content_type: String,
    pub source_filename: Option<String>,
    pub byte_count: u64,
    pub is_voice_message: bool,
    /// `None`, пока вложение не скачано (pointer, а не stream)
    #[serde(with = "serde_bytes")]
    pub data: Option<Vec<u8>>,
}

impl StoredAttachment {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            source_filename: None,
            byte_count: 0,
            is_voice_message: false,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.byte_count = data.len() as u64;
        self.data = Some(data);
        self
    }

    pub fn is_downloaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    pub fn is_video(&self) -> bool {
        self.content_type.starts_with("video/")
    }

    pub fn is_audio(&self) -> bool {
        self.content_type.starts_with("audio/")
    }

    /// Визуальное или аудио-медиа
    pub fn is_media(&self) -> bool {
        self.is_image() || self.is_video() || self.is_audio()
    }

    pub fn is_oversize_text(&self) -> bool {
        self.content_type == Config::global().oversize_text_mime_type
    }
}

/// Контакт в справочнике: источник имен для упоминаний
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredContact {
    pub address: String,
    pub profile_name: Option<String>,
    pub nickname: Option<String>,
}

impl StoredContact {
    /// Никнейм важнее имени из профиля
    pub fn display_name(&self) -> Option<String> {
        self.nickname
            .clone()
            .or_else(|| self.profile_name.clone())
            .filter(|name| !name.is_empty())
    }
}

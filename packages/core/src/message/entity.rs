//! MessageEntity: корень агрегата сообщения.
//!
//! Сообщение создается один раз (через [`MessageBuilder`](crate::message::MessageBuilder)
//! или из строки хранилища) и дальше меняется только через `update_*` методы,
//! каждый из которых принимает write scope вызывающего.
//!
//! Обновление применяется к последней копии строки в scope, она сохраняется
//! и заменяет этот экземпляр. Так устаревший экземпляр не перетирает чужие
//! изменения.

use crate::config::Config;
use crate::message::attachments::{AttachmentReferenceSet, AttachmentRole as Role};
use crate::message::content::{AttachmentId, LinkPreview, MessageSticker};
use crate::message::expiration::ExpirationPolicy;
use crate::message::kind::MessageKind;
use crate::message::lifecycle::{ContentLifecycle, ContentState, RenderableContent, Transition};
use crate::storage::models::{MessageStatus, StoredAttachment, StoredMessage};
use crate::storage::{AttachmentStore, ReadTransaction, WriteTransaction};
use crate::utils::error::{ConstructError, Result};
use crate::utils::serialization;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntity {
    unique_id: String,
    conversation_id: String,
    timestamp: u64,
    received_at_timestamp: u64,
    sort_id: u64,
    kind: MessageKind,
    content: RenderableContent,
    lifecycle: ContentLifecycle,
    expiration: ExpirationPolicy,
}

impl MessageEntity {
    pub(crate) fn from_parts(
        unique_id: String,
        conversation_id: String,
        timestamp: u64,
        received_at_timestamp: u64,
        kind: MessageKind,
        content: RenderableContent,
        is_view_once: bool,
        expiration: ExpirationPolicy,
    ) -> Self {
        Self {
            unique_id,
            conversation_id,
            timestamp,
            received_at_timestamp,
            sort_id: 0,
            kind,
            content,
            lifecycle: ContentLifecycle::new(is_view_once),
            expiration,
        }
    }

    // === Идентичность ===

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn received_at_timestamp(&self) -> u64 {
        self.received_at_timestamp
    }

    /// 0, пока сообщение не вставлено в хранилище
    pub fn sort_id(&self) -> u64 {
        self.sort_id
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    // === Контент ===

    pub fn content(&self) -> &RenderableContent {
        &self.content
    }

    pub fn attachments(&self) -> &AttachmentReferenceSet {
        &self.content.attachments
    }

    /// Есть body-вложения
    pub fn has_attachments(&self) -> bool {
        self.content.attachments.has_body()
    }

    pub fn has_renderable_content(&self) -> bool {
        !self.content.is_empty()
    }

    /// Все id вложений, включая миниатюру цитаты, аватар, превью и стикер
    pub fn all_attachment_ids(&self) -> Vec<AttachmentId> {
        self.content.attachments.all_ids()
    }

    pub fn body_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        self.assert_can_own_attachments();
        self.content.attachments.body_attachments(store)
    }

    pub fn media_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        self.assert_can_own_attachments();
        self.content.attachments.media_attachments(store)
    }

    pub fn has_media_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> bool {
        !self.media_attachments(store).is_empty()
    }

    pub fn oversize_text_attachment<S: AttachmentStore + ?Sized>(
        &self,
        store: &S,
    ) -> Option<StoredAttachment> {
        self.assert_can_own_attachments();
        self.content.attachments.oversize_text_attachment(store)
    }

    pub fn all_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        self.content.attachments.all_attachments(store)
    }

    /// Body как есть, с заглушками упоминаний.
    ///
    /// Если длинный текст вынесен во вложение и оно скачано, возвращается
    /// полный текст из вложения: `body` хранит только его начало.
    pub fn raw_body<S: AttachmentStore + ?Sized>(&self, store: &S) -> Option<String> {
        let body = self.content.body()?;

        if self.kind.can_own_attachments() {
            let full_text = self
                .content
                .attachments
                .oversize_text_attachment(store)
                .and_then(|attachment| attachment.data);
            if let Some(bytes) = full_text {
                match String::from_utf8(bytes) {
                    Ok(text) => return Some(text),
                    Err(e) => warn!(
                        target: "messages::entity",
                        message_id = %self.unique_id,
                        error = %e,
                        "Oversize text attachment is not valid UTF-8"
                    ),
                }
            }
        }

        Some(body.to_string())
    }

    /// Body с подставленными именами вместо упоминаний
    pub fn plaintext_body<R: ReadTransaction + ?Sized>(&self, tx: &R) -> Option<String> {
        let raw = self.raw_body(tx)?;
        match self.content.body_ranges() {
            Some(ranges) if !ranges.is_empty() => {
                Some(ranges.plaintext_body(&raw, |address| tx.display_name(address)))
            }
            _ => Some(raw),
        }
    }

    /// Короткий текст для списка бесед и уведомлений
    pub fn preview_text<R: ReadTransaction + ?Sized>(&self, tx: &R) -> String {
        match self.lifecycle.state() {
            ContentState::RemotelyDeleted { .. } => return "This message was deleted".to_string(),
            ContentState::ViewOnceConsumed => return "View-once media (viewed)".to_string(),
            ContentState::Active if self.lifecycle.is_view_once() => {
                return "View-once media".to_string()
            }
            ContentState::Active => {}
        }

        if let Some(text) = self.plaintext_body(tx) {
            let text = text.trim();
            if !text.is_empty() {
                let max = Config::global().preview_body_max_chars;
                return text.chars().take(max).collect();
            }
        }

        if let Some(sticker) = self.content.message_sticker() {
            return match &sticker.emoji {
                Some(emoji) => format!("{} Sticker", emoji),
                None => "Sticker".to_string(),
            };
        }

        if let Some(contact) = self.content.contact_share() {
            return match contact.name.display_name() {
                Some(name) => format!("Contact: {}", name),
                None => "Contact".to_string(),
            };
        }

        if self.has_attachments() {
            let first = self.content.attachments.body_attachments(tx).into_iter().next();
            let label = match first {
                Some(a) if a.is_image() => "Photo",
                Some(a) if a.is_video() => "Video",
                Some(a) if a.is_audio() && a.is_voice_message => "Voice message",
                Some(a) if a.is_audio() => "Audio",
                _ => "Attachment",
            };
            return label.to_string();
        }

        if let Some(preview) = self.content.link_preview() {
            return preview.url.clone();
        }

        String::new()
    }

    // === Жизненный цикл ===

    pub fn is_view_once(&self) -> bool {
        self.lifecycle.is_view_once()
    }

    pub fn is_view_once_complete(&self) -> bool {
        self.lifecycle.is_view_once_complete()
    }

    pub fn was_remotely_deleted(&self) -> bool {
        self.lifecycle.was_remotely_deleted()
    }

    pub fn content_state(&self) -> ContentState {
        self.lifecycle.state()
    }

    // === Исчезающие сообщения ===

    pub fn expiration(&self) -> &ExpirationPolicy {
        &self.expiration
    }

    pub fn expires_in_seconds(&self) -> u32 {
        self.expiration.expires_in_seconds()
    }

    pub fn expire_started_at(&self) -> u64 {
        self.expiration.expire_started_at()
    }

    pub fn expires_at(&self) -> u64 {
        self.expiration.expires_at()
    }

    pub fn has_per_conversation_expiration(&self) -> bool {
        self.expiration.has_per_conversation_expiration()
    }

    pub fn has_per_conversation_expiration_started(&self) -> bool {
        self.expiration.has_expiration_started()
    }

    pub fn should_start_expire_timer(&self) -> bool {
        self.expiration
            .should_start_expire_timer(self.kind.expiration_eligibility())
    }

    // === Хранилище ===

    /// Вставить новое сообщение; хранилище назначает sort id
    pub fn insert<W: WriteTransaction + ?Sized>(&mut self, tx: &mut W) -> Result<()> {
        if tx.message(&self.unique_id)?.is_some() {
            return Err(ConstructError::ValidationError(format!(
                "Message {} already exists",
                self.unique_id
            )));
        }
        self.sort_id = tx.insert_message(self.to_stored())?;
        debug!(
            target: "messages::entity",
            message_id = %self.unique_id,
            sort_id = self.sort_id,
            "Message inserted"
        );
        Ok(())
    }

    pub fn to_stored(&self) -> StoredMessage {
        let attachments = &self.content.attachments;

        StoredMessage {
            unique_id: self.unique_id.clone(),
            conversation_id: self.conversation_id.clone(),
            sort_id: self.sort_id,
            timestamp: self.timestamp,
            received_at_timestamp: self.received_at_timestamp,
            kind: self.kind.clone(),
            body: self.content.body.clone(),
            body_ranges: self.content.body_ranges.clone(),
            attachment_ids: attachments.body_ids().to_vec(),
            quoted_message: self.content.quoted_message.clone(),
            quoted_thumbnail_id: attachments.id_for(Role::QuotedThumbnail).cloned(),
            contact_share: self.content.contact_share.clone(),
            contact_avatar_id: attachments.id_for(Role::ContactAvatar).cloned(),
            link_preview: self.content.link_preview.clone(),
            link_preview_image_id: attachments.id_for(Role::LinkPreviewImage).cloned(),
            message_sticker: self.content.message_sticker.clone(),
            sticker_attachment_id: attachments.id_for(Role::Sticker).cloned(),
            expires_in_seconds: self.expiration.expires_in_seconds(),
            expire_started_at: self.expiration.expire_started_at(),
            expires_at: self.expiration.expires_at(),
            stored_should_start_expire_timer: self.should_start_expire_timer(),
            is_view_once_message: self.lifecycle.is_view_once(),
            is_view_once_complete: self.lifecycle.is_view_once_complete(),
            was_remotely_deleted: self.lifecycle.was_remotely_deleted(),
        }
    }

    /// Строка сообщения в JSON (экспорт и отладка)
    pub fn to_json(&self) -> Result<String> {
        serialization::to_json(&self.to_stored())
    }

    /// Импорт строки из JSON с теми же проверками, что и `from_stored`
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_stored(serialization::from_json(json)?)
    }

    /// Восстановить сообщение из строки хранилища с проверкой инвариантов
    pub fn from_stored(row: StoredMessage) -> Result<Self> {
        let invalid = |reason: &str| {
            ConstructError::ValidationError(format!("Stored message {}: {}", row.unique_id, reason))
        };

        if row.is_view_once_complete && !row.is_view_once_message {
            return Err(invalid("view-once complete on a regular message"));
        }

        let mut attachments = AttachmentReferenceSet::with_body(row.attachment_ids.clone())?;
        let single_roles = [
            (Role::QuotedThumbnail, &row.quoted_thumbnail_id, row.quoted_message.is_some()),
            (Role::ContactAvatar, &row.contact_avatar_id, row.contact_share.is_some()),
            (Role::LinkPreviewImage, &row.link_preview_image_id, row.link_preview.is_some()),
            (Role::Sticker, &row.sticker_attachment_id, row.message_sticker.is_some()),
        ];
        for (role, id, has_payload) in single_roles {
            if let Some(id) = id {
                if !has_payload {
                    return Err(invalid(&format!("{:?} attachment without its content", role)));
                }
                attachments.assign(role, id.clone())?;
            }
        }

        if !row.kind.can_own_attachments() && !attachments.is_empty() {
            return Err(invalid("message kind cannot own attachments"));
        }

        let state = ContentState::from_flags(row.is_view_once_complete, row.was_remotely_deleted);
        let expiration = ExpirationPolicy::new(row.expires_in_seconds, row.expire_started_at);
        if row.expires_at != expiration.expires_at() {
            warn!(
                target: "messages::entity",
                message_id = %row.unique_id,
                stored = row.expires_at,
                computed = expiration.expires_at(),
                "Stored expires_at is stale; using computed value"
            );
        }

        let content = RenderableContent {
            body: row.body,
            body_ranges: row.body_ranges,
            quoted_message: row.quoted_message,
            contact_share: row.contact_share,
            link_preview: row.link_preview,
            message_sticker: row.message_sticker,
            attachments,
        };
        if state.is_wiped() && !content.is_empty() {
            return Err(ConstructError::ValidationError(format!(
                "Stored message {}: wiped message still has renderable content",
                row.unique_id
            )));
        }

        Ok(Self {
            unique_id: row.unique_id,
            conversation_id: row.conversation_id,
            timestamp: row.timestamp,
            received_at_timestamp: row.received_at_timestamp,
            sort_id: row.sort_id,
            kind: row.kind,
            content,
            lifecycle: ContentLifecycle::restore(row.is_view_once_message, state),
            expiration,
        })
    }

    // === Update With... ===

    /// Запустить таймер исчезновения. Повторный старт игнорируется.
    pub fn update_with_expire_started_at<W: WriteTransaction + ?Sized>(
        &mut self,
        expire_started_at: u64,
        tx: &mut W,
    ) -> Result<bool> {
        self.apply_update(tx, |message| {
            Ok(message.expiration.update_started(expire_started_at))
        })
    }

    pub fn update_with_link_preview<W: WriteTransaction + ?Sized>(
        &mut self,
        preview: LinkPreview,
        image_attachment_id: Option<AttachmentId>,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            message.ensure_rich_content_allowed()?;
            message
                .lifecycle
                .set_link_preview(&mut message.content, preview, image_attachment_id)
        })
    }

    pub fn update_with_message_sticker<W: WriteTransaction + ?Sized>(
        &mut self,
        sticker: MessageSticker,
        attachment_id: AttachmentId,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            message.ensure_rich_content_allowed()?;
            message
                .lifecycle
                .set_message_sticker(&mut message.content, sticker, attachment_id)
        })
    }

    pub fn update_with_quoted_message_thumbnail<W: WriteTransaction + ?Sized>(
        &mut self,
        attachment_id: AttachmentId,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| message.set_quoted_message_thumbnail(attachment_id))
    }

    /// Миниатюра цитаты без записи в хранилище (до первой вставки)
    pub fn set_quoted_message_thumbnail(&mut self, attachment_id: AttachmentId) -> Result<Transition> {
        self.ensure_rich_content_allowed()?;
        self.lifecycle
            .set_quoted_message_thumbnail(&mut self.content, attachment_id)
    }

    /// Убрать ссылку на вложение. Байты удаляет вызывающий.
    pub fn remove_attachment<W: WriteTransaction + ?Sized>(
        &mut self,
        attachment_id: &str,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message.lifecycle.remove_attachment(&mut message.content, attachment_id))
        })
    }

    /// Отметить входящее прочитанным; таймер стартует с момента прочтения
    pub fn update_as_read<W: WriteTransaction + ?Sized>(&mut self, read_at: u64, tx: &mut W) -> Result<bool> {
        self.apply_update(tx, |message| {
            let MessageKind::Incoming { read_at: current, .. } = &mut message.kind else {
                return Ok(false);
            };
            if current.is_some() {
                return Ok(false);
            }
            *current = Some(read_at);
            if message.should_start_expire_timer() {
                message.expiration.update_started(read_at);
            }
            Ok(true)
        })
    }

    /// Сменить статус исходящего; после отправки стартует таймер
    pub fn update_with_message_status<W: WriteTransaction + ?Sized>(
        &mut self,
        status: MessageStatus,
        at: u64,
        tx: &mut W,
    ) -> Result<bool> {
        self.apply_update(tx, |message| {
            let MessageKind::Outgoing { status: current } = &mut message.kind else {
                return Ok(false);
            };
            if *current == status {
                return Ok(false);
            }
            *current = status;
            if message.should_start_expire_timer() {
                message.expiration.update_started(at);
            }
            Ok(true)
        })
    }

    // === View Once ===

    pub fn update_with_view_once_complete<W: WriteTransaction + ?Sized>(
        &mut self,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message.lifecycle.consume_view_once(&mut message.content))
        })
    }

    // === Remote Delete ===

    pub fn update_with_remotely_deleted<W: WriteTransaction + ?Sized>(
        &mut self,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message.lifecycle.apply_remote_delete(&mut message.content))
        })
    }

    // === Partial Delete ===

    pub fn remove_body_text<W: WriteTransaction + ?Sized>(&mut self, tx: &mut W) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message.lifecycle.remove_body_text(&mut message.content))
        })
    }

    pub fn remove_media_and_share_attachments<W: WriteTransaction + ?Sized>(
        &mut self,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message
                .lifecycle
                .remove_media_and_share_attachments(&mut message.content))
        })
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn update_with_message_body<W: WriteTransaction + ?Sized>(
        &mut self,
        body: Option<String>,
        tx: &mut W,
    ) -> Result<Transition> {
        self.apply_update(tx, |message| {
            Ok(message.lifecycle.set_body(&mut message.content, body))
        })
    }

    /// Применить `block` к последней сохраненной копии, сохранить ее и
    /// заменить ею этот экземпляр. Несохраненное сообщение меняется только в памяти.
    fn apply_update<W, T, F>(&mut self, tx: &mut W, block: F) -> Result<T>
    where
        W: WriteTransaction + ?Sized,
        F: FnOnce(&mut MessageEntity) -> Result<T>,
    {
        let Some(row) = tx.message(&self.unique_id)? else {
            trace!(
                target: "messages::entity",
                message_id = %self.unique_id,
                "Message is not persisted yet; updating in memory only"
            );
            return block(self);
        };

        let mut latest = MessageEntity::from_stored(row)?;
        let outcome = block(&mut latest)?;
        tx.update_message(latest.to_stored())?;

        if latest != *self {
            trace!(
                target: "messages::entity",
                message_id = %self.unique_id,
                "Refreshing local copy from storage"
            );
        }
        *self = latest;
        Ok(outcome)
    }

    /// Системные сообщения не получают вложений и после создания
    fn ensure_rich_content_allowed(&self) -> Result<()> {
        if !self.kind.can_own_attachments() {
            return Err(ConstructError::ValidationError(format!(
                "Message {} of kind {:?} cannot own attachments",
                self.unique_id, self.kind
            )));
        }
        Ok(())
    }

    fn assert_can_own_attachments(&self) {
        assert!(
            self.kind.can_own_attachments(),
            "message {} of kind {:?} cannot own attachments",
            self.unique_id,
            self.kind
        );
    }
}

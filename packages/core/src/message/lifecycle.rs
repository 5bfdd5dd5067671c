//! Машина состояний уничтожения контента
//!
//! ```text
//!            consume_view_once                apply_remote_delete
//!   Active ─────────────────────▶ ViewOnceConsumed ─────────────────┐
//!     │                                                              ▼
//!     └──────────── apply_remote_delete ───────────▶ RemotelyDeleted { view_once_consumed }
//! ```
//!
//! Частичное удаление (body или медиа) не меняет состояние: сообщение
//! остается `Active` для оставшегося контента.
//!
//! Все переходы монотонны. Повторный триггер (ретрай таймера, дубль
//! remote-delete) это тихий no-op, а не ошибка.

use crate::message::attachments::{AttachmentReferenceSet, AttachmentRole};
use crate::message::content::{
    AttachmentId, ContactShare, LinkPreview, MessageBodyRanges, MessageSticker, QuotedMessage,
};
use crate::utils::error::{ConstructError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Отображаемый контент сообщения.
///
/// Поля меняются только через [`ContentLifecycle`], поэтому "флаг стерт,
/// а контент остался" невозможно получить снаружи модуля.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderableContent {
    pub(crate) body: Option<String>,
    pub(crate) body_ranges: Option<MessageBodyRanges>,
    pub(crate) quoted_message: Option<QuotedMessage>,
    pub(crate) contact_share: Option<ContactShare>,
    pub(crate) link_preview: Option<LinkPreview>,
    pub(crate) message_sticker: Option<MessageSticker>,
    pub(crate) attachments: AttachmentReferenceSet,
}

impl RenderableContent {
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn body_ranges(&self) -> Option<&MessageBodyRanges> {
        self.body_ranges.as_ref()
    }

    pub fn quoted_message(&self) -> Option<&QuotedMessage> {
        self.quoted_message.as_ref()
    }

    pub fn contact_share(&self) -> Option<&ContactShare> {
        self.contact_share.as_ref()
    }

    pub fn link_preview(&self) -> Option<&LinkPreview> {
        self.link_preview.as_ref()
    }

    pub fn message_sticker(&self) -> Option<&MessageSticker> {
        self.message_sticker.as_ref()
    }

    pub fn attachments(&self) -> &AttachmentReferenceSet {
        &self.attachments
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_none()
            && self.body_ranges.is_none()
            && self.quoted_message.is_none()
            && self.contact_share.is_none()
            && self.link_preview.is_none()
            && self.message_sticker.is_none()
            && self.attachments.is_empty()
    }

    /// Стереть весь контент, вернуть освобожденные id вложений
    fn wipe(&mut self) -> Vec<AttachmentId> {
        let released = self.attachments.clear_all();
        *self = Self::default();
        released
    }
}

/// Состояние контента
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentState {
    #[default]
    Active,
    ViewOnceConsumed,
    /// `view_once_consumed` сохраняет факт просмотра, если он был раньше
    /// (или пришел позже) удаления
    RemotelyDeleted { view_once_consumed: bool },
}

impl ContentState {
    /// Восстановить состояние из флагов строки хранилища
    pub fn from_flags(is_view_once_complete: bool, was_remotely_deleted: bool) -> Self {
        match (is_view_once_complete, was_remotely_deleted) {
            (_, true) => ContentState::RemotelyDeleted {
                view_once_consumed: is_view_once_complete,
            },
            (true, false) => ContentState::ViewOnceConsumed,
            (false, false) => ContentState::Active,
        }
    }

    pub fn is_view_once_complete(self) -> bool {
        matches!(
            self,
            ContentState::ViewOnceConsumed
                | ContentState::RemotelyDeleted {
                    view_once_consumed: true
                }
        )
    }

    pub fn was_remotely_deleted(self) -> bool {
        matches!(self, ContentState::RemotelyDeleted { .. })
    }

    /// Контент стерт целиком
    pub fn is_wiped(self) -> bool {
        self != ContentState::Active
    }
}

/// Результат перехода
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Состояние изменилось; `released` это ссылки, которые больше никто не держит
    Applied { released: Vec<AttachmentId> },
    NoOp,
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    pub fn released(&self) -> &[AttachmentId] {
        match self {
            Transition::Applied { released } => released,
            Transition::NoOp => &[],
        }
    }

    pub fn into_released(self) -> Vec<AttachmentId> {
        match self {
            Transition::Applied { released } => released,
            Transition::NoOp => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLifecycle {
    is_view_once: bool,
    state: ContentState,
}

impl ContentLifecycle {
    pub fn new(is_view_once: bool) -> Self {
        Self {
            is_view_once,
            state: ContentState::Active,
        }
    }

    pub fn restore(is_view_once: bool, state: ContentState) -> Self {
        Self {
            is_view_once,
            state,
        }
    }

    pub fn is_view_once(&self) -> bool {
        self.is_view_once
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    pub fn is_view_once_complete(&self) -> bool {
        self.state.is_view_once_complete()
    }

    pub fn was_remotely_deleted(&self) -> bool {
        self.state.was_remotely_deleted()
    }

    // === Полное стирание ===

    pub fn consume_view_once(&mut self, content: &mut RenderableContent) -> Transition {
        if !self.is_view_once {
            warn!(
                target: "messages::lifecycle",
                "consume_view_once on a message that is not view-once; ignoring"
            );
            return Transition::NoOp;
        }

        match self.state {
            ContentState::Active => {
                let released = content.wipe();
                self.state = ContentState::ViewOnceConsumed;
                debug!(
                    target: "messages::lifecycle",
                    released = released.len(),
                    "View-once content consumed"
                );
                Transition::Applied { released }
            }
            ContentState::RemotelyDeleted {
                view_once_consumed: false,
            } => {
                // Контент уже стерт удалением; фиксируем только просмотр
                self.state = ContentState::RemotelyDeleted {
                    view_once_consumed: true,
                };
                Transition::Applied { released: Vec::new() }
            }
            ContentState::ViewOnceConsumed
            | ContentState::RemotelyDeleted {
                view_once_consumed: true,
            } => {
                trace!(target: "messages::lifecycle", "View-once already consumed");
                Transition::NoOp
            }
        }
    }

    pub fn apply_remote_delete(&mut self, content: &mut RenderableContent) -> Transition {
        match self.state {
            ContentState::Active => {
                let released = content.wipe();
                self.state = ContentState::RemotelyDeleted {
                    view_once_consumed: false,
                };
                debug!(
                    target: "messages::lifecycle",
                    released = released.len(),
                    "Content removed by remote delete"
                );
                Transition::Applied { released }
            }
            ContentState::ViewOnceConsumed => {
                self.state = ContentState::RemotelyDeleted {
                    view_once_consumed: true,
                };
                Transition::Applied { released: Vec::new() }
            }
            ContentState::RemotelyDeleted { .. } => {
                trace!(target: "messages::lifecycle", "Remote delete already applied");
                Transition::NoOp
            }
        }
    }

    // === Частичное удаление ===

    pub fn remove_body_text(&self, content: &mut RenderableContent) -> Transition {
        if content.body.is_none() && content.body_ranges.is_none() {
            return Transition::NoOp;
        }
        content.body = None;
        content.body_ranges = None;
        debug!(target: "messages::lifecycle", "Body text removed");
        Transition::Applied { released: Vec::new() }
    }

    pub fn remove_media_and_share_attachments(&self, content: &mut RenderableContent) -> Transition {
        let mut released = content.attachments.clear_role(AttachmentRole::Body);
        released.extend(content.attachments.clear_role(AttachmentRole::ContactAvatar));
        released.extend(content.attachments.clear_role(AttachmentRole::LinkPreviewImage));
        released.extend(content.attachments.clear_role(AttachmentRole::Sticker));

        let had_payload = content.contact_share.take().is_some()
            | content.link_preview.take().is_some()
            | content.message_sticker.take().is_some();

        if released.is_empty() && !had_payload {
            return Transition::NoOp;
        }
        debug!(
            target: "messages::lifecycle",
            released = released.len(),
            "Media and share attachments removed"
        );
        Transition::Applied { released }
    }

    /// Убрать одну ссылку на вложение
    pub fn remove_attachment(&self, content: &mut RenderableContent, id: &str) -> Transition {
        match content.attachments.remove(id) {
            Some(role) => {
                debug!(
                    target: "messages::lifecycle",
                    attachment_id = %id,
                    ?role,
                    "Attachment reference removed"
                );
                Transition::Applied {
                    released: vec![id.to_string()],
                }
            }
            None => Transition::NoOp,
        }
    }

    // === Поздний rich-контент ===

    pub fn set_link_preview(
        &self,
        content: &mut RenderableContent,
        preview: LinkPreview,
        image_attachment_id: Option<AttachmentId>,
    ) -> Result<Transition> {
        if self.state.is_wiped() {
            trace!(target: "messages::lifecycle", "Ignoring link preview for wiped message");
            return Ok(Transition::NoOp);
        }
        self.ensure_not_view_once()?;
        let released = replace_single_role(
            &mut content.attachments,
            AttachmentRole::LinkPreviewImage,
            image_attachment_id,
        )?;
        content.link_preview = Some(preview);
        Ok(Transition::Applied { released })
    }

    pub fn set_message_sticker(
        &self,
        content: &mut RenderableContent,
        sticker: MessageSticker,
        attachment_id: AttachmentId,
    ) -> Result<Transition> {
        if self.state.is_wiped() {
            trace!(target: "messages::lifecycle", "Ignoring sticker for wiped message");
            return Ok(Transition::NoOp);
        }
        self.ensure_not_view_once()?;
        let released =
            replace_single_role(&mut content.attachments, AttachmentRole::Sticker, Some(attachment_id))?;
        debug!(
            target: "messages::lifecycle",
            pack_id = %sticker.info.pack_id_hex(),
            sticker_id = sticker.info.sticker_id,
            "Sticker set"
        );
        content.message_sticker = Some(sticker);
        Ok(Transition::Applied { released })
    }

    /// Миниатюра цитаты, сгенерированная асинхронно после создания снимка
    pub fn set_quoted_message_thumbnail(
        &self,
        content: &mut RenderableContent,
        attachment_id: AttachmentId,
    ) -> Result<Transition> {
        if self.state.is_wiped() || content.quoted_message.is_none() {
            trace!(target: "messages::lifecycle", "No quote to attach a thumbnail to");
            return Ok(Transition::NoOp);
        }
        let released = content
            .attachments
            .replace_quote_thumbnail(attachment_id)?
            .into_iter()
            .collect();
        Ok(Transition::Applied { released })
    }

    fn ensure_not_view_once(&self) -> Result<()> {
        if self.is_view_once {
            return Err(ConstructError::ValidationError(
                "View-once messages carry only body and attachments".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(any(test, feature = "test-support"))]
    pub fn set_body(&self, content: &mut RenderableContent, body: Option<String>) -> Transition {
        if self.state.is_wiped() {
            return Transition::NoOp;
        }
        content.body = body;
        content.body_ranges = None;
        Transition::Applied { released: Vec::new() }
    }
}

/// Заменить id одиночной роли целиком: сначала проверка, потом изменение
fn replace_single_role(
    attachments: &mut AttachmentReferenceSet,
    role: AttachmentRole,
    id: Option<AttachmentId>,
) -> Result<Vec<AttachmentId>> {
    if let Some(id) = &id {
        if let Some(current) = attachments.role_of(id) {
            if current != role {
                return Err(ConstructError::ValidationError(format!(
                    "Attachment {} is already referenced as {:?}",
                    id, current
                )));
            }
        }
    }

    let mut released = attachments.clear_role(role);
    if let Some(id) = id {
        released.retain(|old| *old != id);
        attachments.assign(role, id)?;
    }
    Ok(released)
}

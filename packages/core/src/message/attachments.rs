//! Ссылки сообщения на вложения, разбитые по ролям.
//!
//! Набор владеет только *ссылками*. Байты вложений живут в хранилище
//! вложений; удалить их должен вызывающий код отдельным вызовом
//! [`WriteTransaction::delete_attachment`](crate::storage::WriteTransaction::delete_attachment).
//!
//! Инвариант: каждый id принадлежит ровно одной роли.

use crate::message::content::AttachmentId;
use crate::storage::models::StoredAttachment;
use crate::storage::AttachmentStore;
use crate::utils::error::{ConstructError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Роль вложения внутри сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttachmentRole {
    Body,
    QuotedThumbnail,
    ContactAvatar,
    LinkPreviewImage,
    Sticker,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReferenceSet {
    body: Vec<AttachmentId>,
    quoted_thumbnail: Option<AttachmentId>,
    contact_avatar: Option<AttachmentId>,
    link_preview_image: Option<AttachmentId>,
    sticker: Option<AttachmentId>,
}

impl AttachmentReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Набор из body-вложений в заданном порядке
    pub fn with_body(ids: Vec<AttachmentId>) -> Result<Self> {
        let mut set = Self::new();
        for id in ids {
            set.push_body(id)?;
        }
        Ok(set)
    }

    // === Чтение ===

    /// Все id: сначала body в исходном порядке, затем миниатюра цитаты,
    /// аватар контакта, картинка превью, стикер
    pub fn all_ids(&self) -> Vec<AttachmentId> {
        let mut ids = self.body.clone();
        ids.extend(
            [
                &self.quoted_thumbnail,
                &self.contact_avatar,
                &self.link_preview_image,
                &self.sticker,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        ids
    }

    pub fn body_ids(&self) -> &[AttachmentId] {
        &self.body
    }

    /// id одиночной роли; для `Body` всегда `None`
    pub fn id_for(&self, role: AttachmentRole) -> Option<&AttachmentId> {
        self.slot(role).and_then(|slot| slot.as_ref())
    }

    pub fn role_of(&self, id: &str) -> Option<AttachmentRole> {
        if self.body.iter().any(|b| b == id) {
            return Some(AttachmentRole::Body);
        }
        [
            AttachmentRole::QuotedThumbnail,
            AttachmentRole::ContactAvatar,
            AttachmentRole::LinkPreviewImage,
            AttachmentRole::Sticker,
        ]
        .into_iter()
        .find(|role| self.id_for(*role).map(String::as_str) == Some(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.role_of(id).is_some()
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
            && self.quoted_thumbnail.is_none()
            && self.contact_avatar.is_none()
            && self.link_preview_image.is_none()
            && self.sticker.is_none()
    }

    // === Изменение ссылок ===

    pub fn push_body(&mut self, id: AttachmentId) -> Result<()> {
        self.ensure_unowned(&id)?;
        self.body.push(id);
        Ok(())
    }

    /// Назначить id одиночной роли. Возвращает вытесненный id.
    pub fn assign(&mut self, role: AttachmentRole, id: AttachmentId) -> Result<Option<AttachmentId>> {
        match self.role_of(&id) {
            Some(current) if current == role => return Ok(None),
            Some(current) => {
                return Err(ConstructError::ValidationError(format!(
                    "Attachment {} is already referenced as {:?}",
                    id, current
                )))
            }
            None => {}
        }
        let slot = self.slot_mut(role).ok_or_else(|| {
            ConstructError::InvalidInput("Body attachments are appended, not assigned".to_string())
        })?;
        Ok(slot.replace(id))
    }

    /// Миниатюра цитаты, сгенерированная позже снимка цитаты
    pub fn replace_quote_thumbnail(&mut self, id: AttachmentId) -> Result<Option<AttachmentId>> {
        self.assign(AttachmentRole::QuotedThumbnail, id)
    }

    /// Убрать ссылку из любой роли. Отсутствующий id: no-op.
    pub fn remove(&mut self, id: &str) -> Option<AttachmentRole> {
        let role = self.role_of(id)?;
        if role == AttachmentRole::Body {
            self.body.retain(|b| b != id);
        } else if let Some(slot) = self.slot_mut(role) {
            *slot = None;
        }
        Some(role)
    }

    /// Очистить роль, вернуть освобожденные id
    pub fn clear_role(&mut self, role: AttachmentRole) -> Vec<AttachmentId> {
        if role == AttachmentRole::Body {
            return std::mem::take(&mut self.body);
        }
        self.slot_mut(role)
            .and_then(|slot| slot.take())
            .into_iter()
            .collect()
    }

    /// Очистить все роли, вернуть освобожденные id в порядке `all_ids`
    pub fn clear_all(&mut self) -> Vec<AttachmentId> {
        let released = self.all_ids();
        *self = Self::default();
        released
    }

    // === Разрешение через хранилище ===

    /// Записи body-вложений; висячие id пропускаются
    pub fn body_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        resolve(store, self.body.iter())
    }

    /// Записи всех ролей; висячие id пропускаются
    pub fn all_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        let ids = self.all_ids();
        resolve(store, ids.iter())
    }

    /// Body-вложения с визуальным или аудио-медиа
    pub fn media_attachments<S: AttachmentStore + ?Sized>(&self, store: &S) -> Vec<StoredAttachment> {
        self.body_attachments(store)
            .into_iter()
            .filter(StoredAttachment::is_media)
            .collect()
    }

    /// Не более одного body-вложения с длинным текстом
    pub fn oversize_text_attachment<S: AttachmentStore + ?Sized>(
        &self,
        store: &S,
    ) -> Option<StoredAttachment> {
        self.body_attachments(store)
            .into_iter()
            .find(StoredAttachment::is_oversize_text)
    }

    fn ensure_unowned(&self, id: &str) -> Result<()> {
        match self.role_of(id) {
            Some(role) => Err(ConstructError::ValidationError(format!(
                "Attachment {} is already referenced as {:?}",
                id, role
            ))),
            None => Ok(()),
        }
    }

    fn slot(&self, role: AttachmentRole) -> Option<&Option<AttachmentId>> {
        match role {
            AttachmentRole::Body => None,
            AttachmentRole::QuotedThumbnail => Some(&self.quoted_thumbnail),
            AttachmentRole::ContactAvatar => Some(&self.contact_avatar),
            AttachmentRole::LinkPreviewImage => Some(&self.link_preview_image),
            AttachmentRole::Sticker => Some(&self.sticker),
        }
    }

    fn slot_mut(&mut self, role: AttachmentRole) -> Option<&mut Option<AttachmentId>> {
        match role {
            AttachmentRole::Body => None,
            AttachmentRole::QuotedThumbnail => Some(&mut self.quoted_thumbnail),
            AttachmentRole::ContactAvatar => Some(&mut self.contact_avatar),
            AttachmentRole::LinkPreviewImage => Some(&mut self.link_preview_image),
            AttachmentRole::Sticker => Some(&mut self.sticker),
        }
    }
}

fn resolve<'a, S, I>(store: &S, ids: I) -> Vec<StoredAttachment>
where
    S: AttachmentStore + ?Sized,
    I: Iterator<Item = &'a AttachmentId>,
{
    ids.filter_map(|id| {
        let attachment = store.attachment(id);
        if attachment.is_none() {
            warn!(
                target: "messages::attachments",
                attachment_id = %id,
                "Skipping dangling attachment reference"
            );
        }
        attachment
    })
    .collect()
}

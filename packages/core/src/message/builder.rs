// Builder для новых сообщений

use crate::config::Config;
use crate::message::attachments::{AttachmentReferenceSet, AttachmentRole};
use crate::message::content::{
    AttachmentId, ContactShare, LinkPreview, MessageBodyRanges, MessageSticker, QuotedMessage,
};
use crate::message::entity::MessageEntity;
use crate::message::expiration::ExpirationPolicy;
use crate::message::kind::MessageKind;
use crate::message::lifecycle::RenderableContent;
use crate::utils::error::{ConstructError, Result};
use crate::utils::{time, uuid};

/// Снимок полей нового сообщения до валидации
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    unique_id: Option<String>,
    conversation_id: String,
    timestamp: u64,
    received_at_timestamp: Option<u64>,
    kind: MessageKind,
    body: Option<String>,
    body_ranges: Option<MessageBodyRanges>,
    attachment_ids: Vec<AttachmentId>,
    quoted_message: Option<(QuotedMessage, Option<AttachmentId>)>,
    contact_share: Option<(ContactShare, Option<AttachmentId>)>,
    link_preview: Option<(LinkPreview, Option<AttachmentId>)>,
    message_sticker: Option<(MessageSticker, AttachmentId)>,
    expires_in_seconds: u32,
    expire_started_at: u64,
    is_view_once: bool,
}

impl MessageBuilder {
    pub fn new(conversation_id: impl Into<String>, timestamp: u64, kind: MessageKind) -> Self {
        Self {
            unique_id: None,
            conversation_id: conversation_id.into(),
            timestamp,
            received_at_timestamp: None,
            kind,
            body: None,
            body_ranges: None,
            attachment_ids: Vec::new(),
            quoted_message: None,
            contact_share: None,
            link_preview: None,
            message_sticker: None,
            expires_in_seconds: 0,
            expire_started_at: 0,
            is_view_once: false,
        }
    }

    pub fn incoming(
        conversation_id: impl Into<String>,
        timestamp: u64,
        author_address: impl Into<String>,
    ) -> Self {
        Self::new(conversation_id, timestamp, MessageKind::incoming(author_address))
    }

    pub fn outgoing(conversation_id: impl Into<String>, timestamp: u64) -> Self {
        Self::new(conversation_id, timestamp, MessageKind::outgoing())
    }

    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    pub fn received_at(mut self, received_at_timestamp: u64) -> Self {
        self.received_at_timestamp = Some(received_at_timestamp);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn body_ranges(mut self, ranges: MessageBodyRanges) -> Self {
        self.body_ranges = Some(ranges);
        self
    }

    pub fn attachment_id(mut self, id: impl Into<AttachmentId>) -> Self {
        self.attachment_ids.push(id.into());
        self
    }

    pub fn attachment_ids(mut self, ids: Vec<AttachmentId>) -> Self {
        self.attachment_ids.extend(ids);
        self
    }

    pub fn quoted_message(mut self, quote: QuotedMessage, thumbnail_id: Option<AttachmentId>) -> Self {
        self.quoted_message = Some((quote, thumbnail_id));
        self
    }

    pub fn contact_share(mut self, contact: ContactShare, avatar_id: Option<AttachmentId>) -> Self {
        self.contact_share = Some((contact, avatar_id));
        self
    }

    pub fn link_preview(mut self, preview: LinkPreview, image_id: Option<AttachmentId>) -> Self {
        self.link_preview = Some((preview, image_id));
        self
    }

    pub fn message_sticker(mut self, sticker: MessageSticker, attachment_id: impl Into<AttachmentId>) -> Self {
        self.message_sticker = Some((sticker, attachment_id.into()));
        self
    }

    pub fn expires_in_seconds(mut self, seconds: u32) -> Self {
        self.expires_in_seconds = seconds;
        self
    }

    pub fn expire_started_at(mut self, started_at: u64) -> Self {
        self.expire_started_at = started_at;
        self
    }

    pub fn view_once(mut self, is_view_once: bool) -> Self {
        self.is_view_once = is_view_once;
        self
    }

    /// Проверить снимок и собрать сообщение
    pub fn build(self) -> Result<MessageEntity> {
        let cfg = Config::global();

        if self.conversation_id.is_empty() {
            return Err(invalid("conversation id is required"));
        }
        if self.timestamp == 0 {
            return Err(invalid("timestamp is required"));
        }

        // Пустой body равносилен отсутствию body
        let body = self.body.filter(|b| !b.is_empty());
        let body_ranges = self.body_ranges.filter(|r| !r.is_empty());
        if let Some(ranges) = &body_ranges {
            let body_len = body.as_ref().map(|b| b.chars().count()).unwrap_or(0);
            if !ranges.fits(body_len) {
                return Err(invalid("body range is outside of the body"));
            }
            // Упоминание стоит на символе-заглушке
            let chars: Vec<char> = body.as_deref().unwrap_or_default().chars().collect();
            let misplaced = ranges
                .mentions()
                .iter()
                .any(|(range, _)| chars.get(range.location) != Some(&cfg.mention_placeholder));
            if misplaced {
                return Err(invalid("mention does not cover a placeholder"));
            }
        }

        let has_rich_content = self.quoted_message.is_some()
            || self.contact_share.is_some()
            || self.link_preview.is_some()
            || self.message_sticker.is_some();

        if !self.kind.can_own_attachments() && (!self.attachment_ids.is_empty() || has_rich_content) {
            return Err(invalid("system messages carry text only"));
        }
        if self.is_view_once && has_rich_content {
            return Err(invalid("view-once messages carry only body and attachments"));
        }
        if self.attachment_ids.len() > cfg.max_body_attachments {
            return Err(invalid(&format!(
                "too many attachments ({} > {})",
                self.attachment_ids.len(),
                cfg.max_body_attachments
            )));
        }
        if self.expires_in_seconds > cfg.max_expire_timer_seconds {
            return Err(invalid(&format!(
                "expire timer {}s exceeds {}s",
                self.expires_in_seconds, cfg.max_expire_timer_seconds
            )));
        }

        let mut attachments = AttachmentReferenceSet::with_body(self.attachment_ids)?;

        let mut assign = |role: AttachmentRole, id: Option<AttachmentId>| -> Result<()> {
            if let Some(id) = id {
                attachments.assign(role, id)?;
            }
            Ok(())
        };

        let quoted_message = match self.quoted_message {
            Some((quote, thumbnail)) => {
                assign(AttachmentRole::QuotedThumbnail, thumbnail)?;
                Some(quote)
            }
            None => None,
        };
        let contact_share = match self.contact_share {
            Some((contact, avatar)) => {
                assign(AttachmentRole::ContactAvatar, avatar)?;
                Some(contact)
            }
            None => None,
        };
        let link_preview = match self.link_preview {
            Some((preview, image)) => {
                assign(AttachmentRole::LinkPreviewImage, image)?;
                Some(preview)
            }
            None => None,
        };
        let message_sticker = match self.message_sticker {
            Some((sticker, id)) => {
                assign(AttachmentRole::Sticker, Some(id))?;
                Some(sticker)
            }
            None => None,
        };

        let content = RenderableContent {
            body,
            body_ranges,
            quoted_message,
            contact_share,
            link_preview,
            message_sticker,
            attachments,
        };

        Ok(MessageEntity::from_parts(
            self.unique_id.unwrap_or_else(uuid::generate_v4),
            self.conversation_id,
            self.timestamp,
            self.received_at_timestamp.unwrap_or_else(time::now_ms),
            self.kind,
            content,
            self.is_view_once,
            ExpirationPolicy::new(self.expires_in_seconds, self.expire_started_at),
        ))
    }
}

fn invalid(reason: &str) -> ConstructError {
    ConstructError::ValidationError(format!("Invalid message: {}", reason))
}

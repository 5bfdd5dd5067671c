//! Модель сообщения: контент, вложения, жизненный цикл и исчезновение

pub mod attachments;
pub mod builder;
pub mod content;
pub mod entity;
pub mod expiration;
pub mod kind;
pub mod lifecycle;

pub use attachments::{AttachmentReferenceSet, AttachmentRole};
pub use builder::MessageBuilder;
pub use content::{
    AttachmentId, BodyRange, BodyRangeKind, ContactName, ContactShare, LinkPreview,
    MessageBodyRanges, MessageSticker, QuotedMessage, StickerInfo, TextStyle,
};
pub use entity::MessageEntity;
pub use expiration::ExpirationPolicy;
pub use kind::{ExpirationEligibility, InfoMessageKind, MessageKind};
pub use lifecycle::{ContentLifecycle, ContentState, RenderableContent, Transition};

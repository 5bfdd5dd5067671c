//! End-to-end tests for the message content lifecycle
//!
//! This test suite covers:
//! - View-once consumption and remote delete (wipe, idempotence, monotonic flags)
//! - Partial deletes (body text, media and shares)
//! - Disappearing message timers and the expiry sweep
//! - Attachment bytes reclaimed inside the same write scope

use anyhow::Result;
use construct_messages::message::{
    BodyRange, ContactName, ContactShare, ContentState, LinkPreview, MessageBodyRanges,
    MessageSticker, QuotedMessage, StickerInfo,
};
use construct_messages::storage::models::{MessageStatus, StoredAttachment, StoredContact};
use construct_messages::storage::{ReadTransaction, TransactionProvider};
use construct_messages::utils::logging;
use construct_messages::{MessageBuilder, MessageEntity, MessengerAPI};

fn setup() -> Result<MessengerAPI> {
    logging::init_for_tests();

    let api = MessengerAPI::new();
    let storage = api.storage();
    storage.save_contact(StoredContact {
        address: "bob".to_string(),
        profile_name: Some("Bob".to_string()),
        nickname: None,
    })?;
    for (id, content_type) in [
        ("photo", "image/jpeg"),
        ("clip", "video/mp4"),
        ("preview", "image/png"),
        ("sticker", "image/webp"),
        ("avatar", "image/jpeg"),
        ("thumb", "image/jpeg"),
    ] {
        storage.save_attachment(StoredAttachment::new(id, content_type).with_data(vec![1, 2, 3]))?;
    }
    Ok(api)
}

fn sticker() -> MessageSticker {
    MessageSticker {
        info: StickerInfo {
            pack_id: vec![0xAB; 16],
            pack_key: vec![0xCD; 32],
            sticker_id: 3,
        },
        emoji: None,
    }
}

fn rich_message(api: &MessengerAPI, unique_id: &str, view_once: bool) -> Result<MessageEntity> {
    let builder = MessageBuilder::incoming("conv1", 1_000, "alice")
        .unique_id(unique_id)
        .body("Hi \u{FFFC}")
        .body_ranges(MessageBodyRanges::new(vec![BodyRange::mention(3, 1, "bob")]))
        .attachment_ids(vec!["photo".to_string(), "clip".to_string()])
        .view_once(view_once);

    let builder = if view_once {
        builder
    } else {
        builder
            .quoted_message(QuotedMessage::new(500, "bob", Some("earlier".to_string())), Some("thumb".to_string()))
            .contact_share(
                ContactShare {
                    name: ContactName {
                        given_name: Some("Carol".to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                Some("avatar".to_string()),
            )
            .link_preview(LinkPreview::new("https://example.org"), Some("preview".to_string()))
            .message_sticker(sticker(), "sticker")
    };

    let mut message = builder.build()?;
    api.lifecycle().insert(&mut message)?;
    Ok(message)
}

/// Scenario: "Hi @Bob" + body attachment + view-once, consumed twice
#[test]
fn test_view_once_scenario() -> Result<()> {
    let api = setup()?;
    let message = rich_message(&api, "m1", true)?;

    let plaintext = api.storage().read_with(|tx| Ok(message.plaintext_body(tx)))?;
    assert_eq!(plaintext.as_deref(), Some("Hi @Bob"));

    let consumed = api.lifecycle().consume_view_once("m1")?;
    assert_eq!(consumed.content().body(), None);
    assert!(consumed.all_attachment_ids().is_empty());
    assert!(consumed.is_view_once_complete());
    assert!(!consumed.has_renderable_content());

    // Байты вложений удалены в том же scope
    assert!(api.storage().load_attachment("photo")?.is_none());
    assert!(api.storage().load_attachment("clip")?.is_none());

    let again = api.lifecycle().consume_view_once("m1")?;
    assert_eq!(again, consumed);
    Ok(())
}

/// Scenario: link preview + sticker + "ok", media removed
#[test]
fn test_remove_media_scenario() -> Result<()> {
    let api = setup()?;
    let mut message = MessageBuilder::outgoing("conv1", 1_000)
        .unique_id("m1")
        .body("ok")
        .link_preview(LinkPreview::new("https://example.org"), Some("preview".to_string()))
        .message_sticker(sticker(), "sticker")
        .build()?;
    api.lifecycle().insert(&mut message)?;

    let updated = api.lifecycle().remove_media_and_share_attachments("m1")?;
    assert_eq!(updated.content().body(), Some("ok"));
    assert!(updated.content().link_preview().is_none());
    assert!(updated.content().message_sticker().is_none());
    assert!(api.storage().load_attachment("preview")?.is_none());
    assert!(api.storage().load_attachment("sticker")?.is_none());
    Ok(())
}

#[test]
fn test_wipe_clears_everything() -> Result<()> {
    let api = setup()?;
    rich_message(&api, "m1", false)?;

    let deleted = api.lifecycle().apply_remote_delete("m1")?;
    assert!(!deleted.has_renderable_content());
    assert!(deleted.all_attachment_ids().is_empty());
    assert!(deleted.was_remotely_deleted());
    assert!(!deleted.is_view_once_complete());
    assert_eq!(api.storage().attachment_count()?, 0);

    let again = api.lifecycle().apply_remote_delete("m1")?;
    assert_eq!(again, deleted);
    Ok(())
}

#[test]
fn test_flags_never_reset() -> Result<()> {
    let api = setup()?;
    rich_message(&api, "m1", true)?;
    let lifecycle = api.lifecycle();

    // Удаление приходит раньше просмотра: оба флага сходятся в терминальном состоянии
    let deleted = lifecycle.apply_remote_delete("m1")?;
    assert_eq!(deleted.content_state(), ContentState::RemotelyDeleted { view_once_consumed: false });

    let viewed = lifecycle.consume_view_once("m1")?;
    assert!(viewed.was_remotely_deleted());
    assert!(viewed.is_view_once_complete());

    let after_partial = lifecycle.remove_body_text("m1")?;
    assert!(after_partial.was_remotely_deleted());
    assert!(after_partial.is_view_once_complete());
    Ok(())
}

#[test]
fn test_remove_body_text_keeps_attachments_and_shares() -> Result<()> {
    let api = setup()?;
    let original = rich_message(&api, "m1", false)?;

    let updated = api.lifecycle().remove_body_text("m1")?;
    assert_eq!(updated.content().body(), None);
    assert!(updated.content().body_ranges().is_none());
    assert_eq!(updated.all_attachment_ids(), original.all_attachment_ids());
    assert_eq!(updated.content().quoted_message(), original.content().quoted_message());
    assert_eq!(updated.content().contact_share(), original.content().contact_share());
    assert_eq!(updated.content().link_preview(), original.content().link_preview());
    assert_eq!(updated.content().message_sticker(), original.content().message_sticker());
    assert_eq!(api.storage().attachment_count()?, 6);
    Ok(())
}

#[test]
fn test_remove_media_keeps_quote() -> Result<()> {
    let api = setup()?;
    rich_message(&api, "m1", false)?;

    let updated = api.lifecycle().remove_media_and_share_attachments("m1")?;
    assert_eq!(updated.content().body(), Some("Hi \u{FFFC}"));
    assert!(!updated.has_attachments());
    assert!(updated.content().contact_share().is_none());
    assert!(updated.content().quoted_message().is_some());
    assert_eq!(updated.all_attachment_ids(), vec!["thumb".to_string()]);
    assert_eq!(updated.content_state(), ContentState::Active);

    // Остались только миниатюра цитаты
    assert_eq!(api.storage().attachment_count()?, 1);
    assert!(api.storage().load_attachment("thumb")?.is_some());
    Ok(())
}

#[test]
fn test_remove_single_attachment() -> Result<()> {
    let api = setup()?;
    rich_message(&api, "m1", false)?;

    let updated = api.lifecycle().remove_attachment("m1", "clip")?;
    assert_eq!(updated.attachments().body_ids(), ["photo".to_string()]);
    assert!(api.storage().load_attachment("clip")?.is_none());

    // Повтор и чужой id не ошибка
    api.lifecycle().remove_attachment("m1", "clip")?;
    api.lifecycle().remove_attachment("m1", "unknown")?;
    Ok(())
}

#[test]
fn test_disappearing_message_lifecycle() -> Result<()> {
    let api = setup()?;
    let lifecycle = api.lifecycle();

    let mut message = MessageBuilder::outgoing("conv1", 1_000)
        .unique_id("m1")
        .body("self destruct")
        .attachment_id("photo")
        .expires_in_seconds(86_400)
        .build()?;
    lifecycle.insert(&mut message)?;
    assert!(message.has_per_conversation_expiration());
    assert!(!message.has_per_conversation_expiration_started());
    assert_eq!(message.expires_at(), 0);

    // Pending: таймер еще не стартует
    assert!(lifecycle.update_status("m1", MessageStatus::Pending, 2_000).is_ok());
    assert_eq!(lifecycle.load("m1")?.expire_started_at(), 0);

    let t = 1_700_000_000_000;
    assert!(lifecycle.update_status("m1", MessageStatus::Sent, t)?);
    assert!(!lifecycle.start_expiration("m1", t + 1_000)?);

    let loaded = lifecycle.load("m1")?;
    assert!(loaded.has_per_conversation_expiration_started());
    assert_eq!(loaded.expires_at(), t + 86_400_000);

    let due = api
        .storage()
        .read_with(|tx| tx.messages_expired_at(t + 86_400_000))?;
    assert_eq!(due.len(), 1);

    assert!(lifecycle.expire(t + 86_399_999)?.is_empty());
    assert_eq!(lifecycle.expire(t + 86_400_000)?, vec!["m1".to_string()]);
    assert!(api.storage().load_message("m1")?.is_none());
    assert!(api.storage().load_attachment("photo")?.is_none());
    Ok(())
}

#[test]
fn test_incoming_timer_starts_on_read() -> Result<()> {
    let api = setup()?;
    let lifecycle = api.lifecycle();

    let mut message = MessageBuilder::incoming("conv1", 1_000, "alice")
        .unique_id("m1")
        .body("read me")
        .expires_in_seconds(60)
        .build()?;
    lifecycle.insert(&mut message)?;

    assert!(lifecycle.expire(u64::MAX)?.is_empty());
    assert!(lifecycle.mark_read("m1", 10_000)?);
    assert_eq!(lifecycle.load("m1")?.expires_at(), 70_000);
    assert_eq!(lifecycle.expire(70_000)?, vec!["m1".to_string()]);
    Ok(())
}

#[test]
fn test_zero_timer_never_expires() -> Result<()> {
    let api = setup()?;
    let lifecycle = api.lifecycle();

    let mut message = MessageBuilder::outgoing("conv1", 1_000)
        .unique_id("m1")
        .body("forever")
        .expire_started_at(5_000)
        .build()?;
    lifecycle.insert(&mut message)?;

    assert!(!message.has_per_conversation_expiration());
    assert_eq!(message.expires_at(), 0);
    assert!(lifecycle.expire(u64::MAX)?.is_empty());
    Ok(())
}

#[test]
fn test_late_link_preview_replaces_image() -> Result<()> {
    let api = setup()?;
    let mut message = MessageBuilder::outgoing("conv1", 1_000)
        .unique_id("m1")
        .body("https://example.org")
        .build()?;
    api.lifecycle().insert(&mut message)?;

    let storage = api.storage();
    let first = storage.write_with(|tx| {
        message.update_with_link_preview(LinkPreview::new("https://example.org"), Some("preview".to_string()), tx)
    })?;
    assert!(first.released().is_empty());

    let second = storage.write_with(|tx| {
        message.update_with_link_preview(LinkPreview::new("https://example.org"), Some("thumb".to_string()), tx)
    })?;
    assert_eq!(second.released(), ["preview".to_string()]);

    let loaded = api.lifecycle().load("m1")?;
    assert_eq!(loaded.all_attachment_ids(), vec!["thumb".to_string()]);
    Ok(())
}

#[test]
fn test_json_export_into_another_store() -> Result<()> {
    let source = setup()?;
    let original = rich_message(&source, "m1", false)?;
    let json = source.lifecycle().export_json("m1")?;

    let target = MessengerAPI::new();
    let imported = target.lifecycle().import_json(&json)?;
    assert_eq!(imported.content(), original.content());
    assert_eq!(imported.all_attachment_ids(), original.all_attachment_ids());

    // Повторный импорт того же id отклоняется
    assert!(target.lifecycle().import_json(&json).is_err());
    Ok(())
}

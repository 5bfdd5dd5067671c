// Жизненный цикл сообщений по id: одна операция = один write scope
//
// Сущность только отпускает ссылки на вложения. Здесь же, в том же scope,
// удаляются байты отпущенных вложений.

use crate::message::content::AttachmentId;
use crate::message::entity::MessageEntity;
use crate::message::lifecycle::Transition;
use crate::storage::models::MessageStatus;
use crate::storage::{ReadTransaction, TransactionProvider, WriteTransaction};
use crate::utils::error::{ConstructError, Result};
use tracing::{debug, info, warn};

pub struct MessageLifecycleAPI<'s, P: TransactionProvider> {
    storage: &'s P,
}

impl<'s, P> MessageLifecycleAPI<'s, P>
where
    P: TransactionProvider + 's,
{
    pub fn new(storage: &'s P) -> Self {
        Self { storage }
    }

    /// Сохранить новое сообщение
    pub fn insert(&self, message: &mut MessageEntity) -> Result<()> {
        self.storage.write_with(|tx| message.insert(tx))
    }

    pub fn load(&self, unique_id: &str) -> Result<MessageEntity> {
        self.storage.read_with(|tx| load_message(tx, unique_id))
    }

    /// Сообщение в виде JSON-строки хранилища
    pub fn export_json(&self, unique_id: &str) -> Result<String> {
        self.load(unique_id)?.to_json()
    }

    /// Вставить сообщение из JSON-экспорта; sort id назначается заново
    pub fn import_json(&self, json: &str) -> Result<MessageEntity> {
        let mut message = MessageEntity::from_json(json)?;
        self.insert(&mut message)?;
        Ok(message)
    }

    pub fn consume_view_once(&self, unique_id: &str) -> Result<MessageEntity> {
        self.transition(unique_id, "view_once_complete", |message, tx| {
            message.update_with_view_once_complete(tx)
        })
    }

    pub fn apply_remote_delete(&self, unique_id: &str) -> Result<MessageEntity> {
        self.transition(unique_id, "remote_delete", |message, tx| {
            message.update_with_remotely_deleted(tx)
        })
    }

    pub fn remove_body_text(&self, unique_id: &str) -> Result<MessageEntity> {
        self.transition(unique_id, "remove_body_text", |message, tx| {
            message.remove_body_text(tx)
        })
    }

    pub fn remove_media_and_share_attachments(&self, unique_id: &str) -> Result<MessageEntity> {
        self.transition(unique_id, "remove_media", |message, tx| {
            message.remove_media_and_share_attachments(tx)
        })
    }

    /// Убрать одно вложение из сообщения и удалить его байты
    pub fn remove_attachment(&self, unique_id: &str, attachment_id: &str) -> Result<MessageEntity> {
        self.transition(unique_id, "remove_attachment", |message, tx| {
            message.remove_attachment(attachment_id, tx)
        })
    }

    /// Запустить таймер исчезновения. `false`, если он уже шел.
    pub fn start_expiration(&self, unique_id: &str, started_at: u64) -> Result<bool> {
        self.storage.write_with(|tx| {
            let mut message = load_message(tx, unique_id)?;
            message.update_with_expire_started_at(started_at, tx)
        })
    }

    pub fn mark_read(&self, unique_id: &str, read_at: u64) -> Result<bool> {
        self.storage.write_with(|tx| {
            let mut message = load_message(tx, unique_id)?;
            message.update_as_read(read_at, tx)
        })
    }

    pub fn update_status(&self, unique_id: &str, status: MessageStatus, at: u64) -> Result<bool> {
        self.storage.write_with(|tx| {
            let mut message = load_message(tx, unique_id)?;
            message.update_with_message_status(status, at, tx)
        })
    }

    /// Удалить все сообщения с `expires_at <= now` вместе с их вложениями.
    /// Возвращает id удаленных сообщений.
    pub fn expire(&self, now: u64) -> Result<Vec<String>> {
        self.storage.write_with(|tx| {
            let mut removed = Vec::new();

            for row in tx.messages_expired_at(now)? {
                // Битая строка не должна блокировать остальную очистку
                let attachment_ids = match MessageEntity::from_stored(row.clone()) {
                    Ok(message) => message.all_attachment_ids(),
                    Err(e) => {
                        warn!(
                            target: "messages::expiration",
                            message_id = %row.unique_id,
                            error = %e,
                            "Expired row does not decode; removing by stored columns"
                        );
                        row.all_attachment_ids()
                    }
                };

                tx.remove_message(&row.unique_id)?;
                delete_attachments(tx, &attachment_ids)?;

                debug!(
                    target: "messages::expiration",
                    message_id = %row.unique_id,
                    expires_at = row.expires_at,
                    attachments = attachment_ids.len(),
                    "Message expired"
                );
                removed.push(row.unique_id);
            }

            if !removed.is_empty() {
                info!(target: "messages::expiration", count = removed.len(), "Expired messages removed");
            }
            Ok(removed)
        })
    }

    fn transition<F>(&self, unique_id: &str, operation: &'static str, f: F) -> Result<MessageEntity>
    where
        F: FnOnce(&mut MessageEntity, &mut P::Write<'s>) -> Result<Transition>,
    {
        self.storage.write_with(|tx| {
            let mut message = load_message(tx, unique_id)?;
            let transition = f(&mut message, tx)?;

            if transition.is_applied() {
                delete_attachments(tx, transition.released())?;
                debug!(
                    target: "messages::lifecycle",
                    message_id = %unique_id,
                    operation,
                    released = transition.released().len(),
                    "Lifecycle transition committed"
                );
            }
            Ok(message)
        })
    }
}

fn load_message<R: ReadTransaction + ?Sized>(tx: &R, unique_id: &str) -> Result<MessageEntity> {
    let row = tx
        .message(unique_id)?
        .ok_or_else(|| ConstructError::NotFound(format!("Message {}", unique_id)))?;
    MessageEntity::from_stored(row)
}

fn delete_attachments<W: WriteTransaction + ?Sized>(tx: &mut W, ids: &[AttachmentId]) -> Result<()> {
    for id in ids {
        tx.delete_attachment(id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::builder::MessageBuilder;
    use crate::storage::models::StoredAttachment;
    use crate::storage::MemoryStorage;

    fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage
            .save_attachment(StoredAttachment::new("a1", "image/jpeg").with_data(vec![1, 2, 3]))
            .unwrap();
        storage
    }

    #[test]
    fn test_consume_view_once_deletes_bytes() {
        let storage = seeded();
        let api = MessageLifecycleAPI::new(&storage);

        let mut message = MessageBuilder::incoming("conv1", 1_000, "alice")
            .unique_id("m1")
            .attachment_id("a1")
            .view_once(true)
            .build()
            .unwrap();
        api.insert(&mut message).unwrap();

        let consumed = api.consume_view_once("m1").unwrap();
        assert!(consumed.is_view_once_complete());
        assert!(!consumed.has_attachments());
        assert!(storage.load_attachment("a1").unwrap().is_none());

        // Повтор ничего не меняет
        let again = api.consume_view_once("m1").unwrap();
        assert_eq!(again, consumed);
    }

    #[test]
    fn test_missing_message_is_not_found() {
        let storage = seeded();
        let api = MessageLifecycleAPI::new(&storage);

        assert!(matches!(api.apply_remote_delete("nope"), Err(ConstructError::NotFound(_))));
        assert!(matches!(api.start_expiration("nope", 1), Err(ConstructError::NotFound(_))));
        assert!(matches!(api.load("nope"), Err(ConstructError::NotFound(_))));
    }

    #[test]
    fn test_expire_removes_row_and_attachments() {
        let storage = seeded();
        let api = MessageLifecycleAPI::new(&storage);

        let mut message = MessageBuilder::outgoing("conv1", 1_000)
            .unique_id("m1")
            .body("bye")
            .attachment_id("a1")
            .expires_in_seconds(10)
            .build()
            .unwrap();
        api.insert(&mut message).unwrap();

        assert!(api.start_expiration("m1", 5_000).unwrap());
        assert!(!api.start_expiration("m1", 6_000).unwrap());
        assert_eq!(api.load("m1").unwrap().expires_at(), 15_000);

        assert!(api.expire(14_999).unwrap().is_empty());
        assert_eq!(api.expire(15_000).unwrap(), vec!["m1".to_string()]);
        assert_eq!(storage.message_count().unwrap(), 0);
        assert_eq!(storage.attachment_count().unwrap(), 0);
    }

    #[test]
    fn test_expire_removes_undecodable_row_with_valid_one() {
        let storage = seeded();
        storage
            .save_attachment(StoredAttachment::new("a2", "image/png").with_data(vec![4]))
            .unwrap();
        let api = MessageLifecycleAPI::new(&storage);

        let mut valid = MessageBuilder::outgoing("conv1", 1_000)
            .unique_id("valid")
            .attachment_id("a1")
            .expires_in_seconds(1)
            .expire_started_at(1_000)
            .build()
            .unwrap();
        api.insert(&mut valid).unwrap();

        // Стертая строка с оставшимся body не проходит from_stored
        let mut broken = MessageBuilder::outgoing("conv1", 1_000)
            .unique_id("broken")
            .body("left over")
            .attachment_id("a2")
            .expires_in_seconds(1)
            .expire_started_at(500)
            .build()
            .unwrap()
            .to_stored();
        broken.was_remotely_deleted = true;
        storage.write_with(|tx| tx.insert_message(broken)).unwrap();
        assert!(api.load("broken").is_err());

        let removed = api.expire(10_000).unwrap();
        assert_eq!(removed, vec!["broken".to_string(), "valid".to_string()]);
        assert_eq!(storage.message_count().unwrap(), 0);
        assert_eq!(storage.attachment_count().unwrap(), 0);
    }
}

// In-memory storage для тестов и non-WASM платформ
//
// Строки сообщений лежат в bincode, как в персистентном хранилище.
// Write scope работает с копией состояния: commit подменяет состояние,
// drop без commit откатывает изменения.

use crate::message::content::AttachmentId;
use crate::storage::models::*;
use crate::storage::{
    AttachmentStore, DisplayNameResolver, ReadTransaction, TransactionProvider, WriteTransaction,
};
use crate::utils::error::{ConstructError, Result};
use crate::utils::serialization;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    messages: HashMap<String, Vec<u8>>,
    attachments: HashMap<AttachmentId, StoredAttachment>,
    contacts: HashMap<String, StoredContact>,
    next_sort_id: u64,
}

impl MemoryState {
    fn message(&self, unique_id: &str) -> Result<Option<StoredMessage>> {
        self.messages
            .get(unique_id)
            .map(|bytes| serialization::from_bytes(bytes))
            .transpose()
    }

    fn messages_expired_at(&self, now: u64) -> Result<Vec<StoredMessage>> {
        let mut expired = Vec::new();
        for bytes in self.messages.values() {
            let row: StoredMessage = serialization::from_bytes(bytes)?;
            if row.expires_at > 0 && row.expires_at <= now {
                expired.push(row);
            }
        }

        // Сортировка по expires_at, затем по sort id
        expired.sort_by_key(|m| (m.expires_at, m.sort_id));
        Ok(expired)
    }

    fn display_name(&self, address: &str) -> Option<String> {
        self.contacts.get(address).and_then(StoredContact::display_name)
    }
}

/// In-memory хранилище
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
        }
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| ConstructError::StorageError("Memory storage lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| ConstructError::StorageError("Memory storage lock poisoned".to_string()))
    }

    // === Контакты ===

    pub fn save_contact(&self, contact: StoredContact) -> Result<()> {
        self.write_state()?
            .contacts
            .insert(contact.address.clone(), contact);
        Ok(())
    }

    pub fn load_contact(&self, address: &str) -> Result<Option<StoredContact>> {
        Ok(self.read_state()?.contacts.get(address).cloned())
    }

    // === Вложения ===

    pub fn save_attachment(&self, attachment: StoredAttachment) -> Result<()> {
        self.write_state()?
            .attachments
            .insert(attachment.id.clone(), attachment);
        Ok(())
    }

    pub fn load_attachment(&self, id: &str) -> Result<Option<StoredAttachment>> {
        Ok(self.read_state()?.attachments.get(id).cloned())
    }

    pub fn attachment_count(&self) -> Result<usize> {
        Ok(self.read_state()?.attachments.len())
    }

    // === Сообщения ===

    pub fn load_message(&self, unique_id: &str) -> Result<Option<StoredMessage>> {
        self.read_state()?.message(unique_id)
    }

    pub fn message_count(&self) -> Result<usize> {
        Ok(self.read_state()?.messages.len())
    }

    // === Утилиты ===

    pub fn clear_all(&self) -> Result<()> {
        *self.write_state()? = MemoryState::default();
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionProvider for MemoryStorage {
    type Read<'a> = MemoryReadTransaction<'a> where Self: 'a;
    type Write<'a> = MemoryWriteTransaction<'a> where Self: 'a;

    fn read(&self) -> Result<Self::Read<'_>> {
        Ok(MemoryReadTransaction {
            state: self.read_state()?,
        })
    }

    // Каждый write scope копирует все состояние, включая строки сообщений.
    // Для тестов и небольших локальных баз этого достаточно; персистентному
    // хранилищу нужен журнал изменений вместо копии.
    fn write(&self) -> Result<Self::Write<'_>> {
        let guard = self.write_state()?;
        let pending = guard.clone();
        Ok(MemoryWriteTransaction { guard, pending })
    }
}

/// Read scope: держит read lock
pub struct MemoryReadTransaction<'a> {
    state: RwLockReadGuard<'a, MemoryState>,
}

impl AttachmentStore for MemoryReadTransaction<'_> {
    fn attachment(&self, id: &str) -> Option<StoredAttachment> {
        self.state.attachments.get(id).cloned()
    }
}

impl DisplayNameResolver for MemoryReadTransaction<'_> {
    fn display_name(&self, address: &str) -> Option<String> {
        self.state.display_name(address)
    }
}

impl ReadTransaction for MemoryReadTransaction<'_> {
    fn message(&self, unique_id: &str) -> Result<Option<StoredMessage>> {
        self.state.message(unique_id)
    }

    fn messages_expired_at(&self, now: u64) -> Result<Vec<StoredMessage>> {
        self.state.messages_expired_at(now)
    }
}

/// Write scope: держит write lock и копию состояния до commit
pub struct MemoryWriteTransaction<'a> {
    guard: RwLockWriteGuard<'a, MemoryState>,
    pending: MemoryState,
}

impl AttachmentStore for MemoryWriteTransaction<'_> {
    fn attachment(&self, id: &str) -> Option<StoredAttachment> {
        self.pending.attachments.get(id).cloned()
    }
}

impl DisplayNameResolver for MemoryWriteTransaction<'_> {
    fn display_name(&self, address: &str) -> Option<String> {
        self.pending.display_name(address)
    }
}

impl ReadTransaction for MemoryWriteTransaction<'_> {
    fn message(&self, unique_id: &str) -> Result<Option<StoredMessage>> {
        self.pending.message(unique_id)
    }

    fn messages_expired_at(&self, now: u64) -> Result<Vec<StoredMessage>> {
        self.pending.messages_expired_at(now)
    }
}

impl WriteTransaction for MemoryWriteTransaction<'_> {
    fn insert_message(&mut self, mut row: StoredMessage) -> Result<u64> {
        if self.pending.messages.contains_key(&row.unique_id) {
            return Err(ConstructError::StorageError(format!(
                "Message {} already stored",
                row.unique_id
            )));
        }

        self.pending.next_sort_id += 1;
        row.sort_id = self.pending.next_sort_id;
        let bytes = serialization::to_bytes(&row)?;
        self.pending.messages.insert(row.unique_id.clone(), bytes);

        trace!(
            target: "storage::memory",
            message_id = %row.unique_id,
            sort_id = row.sort_id,
            "Row inserted"
        );
        Ok(row.sort_id)
    }

    fn update_message(&mut self, mut row: StoredMessage) -> Result<()> {
        let current = self
            .pending
            .message(&row.unique_id)?
            .ok_or_else(|| ConstructError::NotFound(format!("Message {}", row.unique_id)))?;

        // sort id назначает только хранилище
        row.sort_id = current.sort_id;
        let bytes = serialization::to_bytes(&row)?;
        self.pending.messages.insert(row.unique_id.clone(), bytes);

        trace!(target: "storage::memory", message_id = %row.unique_id, "Row updated");
        Ok(())
    }

    fn remove_message(&mut self, unique_id: &str) -> Result<()> {
        if self.pending.messages.remove(unique_id).is_some() {
            trace!(target: "storage::memory", message_id = %unique_id, "Row removed");
        }
        Ok(())
    }

    fn save_attachment(&mut self, attachment: StoredAttachment) -> Result<()> {
        self.pending
            .attachments
            .insert(attachment.id.clone(), attachment);
        Ok(())
    }

    fn delete_attachment(&mut self, id: &AttachmentId) -> Result<()> {
        if self.pending.attachments.remove(id).is_some() {
            trace!(target: "storage::memory", attachment_id = %id, "Attachment bytes deleted");
        }
        Ok(())
    }

    fn commit(self) -> Result<()> {
        let Self { mut guard, pending } = self;
        *guard = pending;
        debug!(target: "storage::memory", "Write transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::kind::MessageKind;

    fn row(unique_id: &str, expires_at: u64) -> StoredMessage {
        StoredMessage {
            unique_id: unique_id.to_string(),
            conversation_id: "conv1".to_string(),
            sort_id: 0,
            timestamp: 100,
            received_at_timestamp: 100,
            kind: MessageKind::incoming("alice"),
            body: Some("hi".to_string()),
            body_ranges: None,
            attachment_ids: Vec::new(),
            quoted_message: None,
            quoted_thumbnail_id: None,
            contact_share: None,
            contact_avatar_id: None,
            link_preview: None,
            link_preview_image_id: None,
            message_sticker: None,
            sticker_attachment_id: None,
            expires_in_seconds: 0,
            expire_started_at: 0,
            expires_at,
            stored_should_start_expire_timer: false,
            is_view_once_message: false,
            is_view_once_complete: false,
            was_remotely_deleted: false,
        }
    }

    #[test]
    fn test_insert_assigns_sort_ids() {
        let storage = MemoryStorage::new();

        let (first, second) = storage
            .write_with(|tx| Ok((tx.insert_message(row("m1", 0))?, tx.insert_message(row("m2", 0))?)))
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(storage.load_message("m2").unwrap().unwrap().sort_id, 2);
        assert_eq!(storage.message_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let storage = MemoryStorage::new();
        storage.write_with(|tx| tx.insert_message(row("m1", 0))).unwrap();

        let result = storage.write_with(|tx| tx.insert_message(row("m1", 0)));
        assert!(matches!(result, Err(ConstructError::StorageError(_))));
    }

    #[test]
    fn test_uncommitted_write_rolls_back() {
        let storage = MemoryStorage::new();
        {
            let mut tx = storage.write().unwrap();
            tx.insert_message(row("m1", 0)).unwrap();
            assert!(tx.message("m1").unwrap().is_some());
        }
        assert!(storage.load_message("m1").unwrap().is_none());

        let result: Result<()> = storage.write_with(|tx| {
            tx.insert_message(row("m2", 0))?;
            Err(ConstructError::InternalError("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(storage.message_count().unwrap(), 0);
    }

    #[test]
    fn test_update_keeps_sort_id() {
        let storage = MemoryStorage::new();
        storage.write_with(|tx| tx.insert_message(row("m1", 0))).unwrap();

        let mut changed = row("m1", 0);
        changed.body = Some("edited".to_string());
        changed.sort_id = 99;
        storage.write_with(|tx| tx.update_message(changed)).unwrap();

        let loaded = storage.load_message("m1").unwrap().unwrap();
        assert_eq!(loaded.sort_id, 1);
        assert_eq!(loaded.body.as_deref(), Some("edited"));

        let missing = storage.write_with(|tx| tx.update_message(row("nope", 0)));
        assert!(matches!(missing, Err(ConstructError::NotFound(_))));
    }

    #[test]
    fn test_expired_query_orders_by_expires_at() {
        let storage = MemoryStorage::new();
        storage
            .write_with(|tx| {
                tx.insert_message(row("late", 300))?;
                tx.insert_message(row("never", 0))?;
                tx.insert_message(row("early", 100))?;
                tx.insert_message(row("future", 1_000))?;
                Ok(())
            })
            .unwrap();

        let expired = storage.read_with(|tx| tx.messages_expired_at(300)).unwrap();
        let ids: Vec<&str> = expired.iter().map(|m| m.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_attachments_and_contacts() {
        let storage = MemoryStorage::new();
        storage
            .save_attachment(StoredAttachment::new("a1", "image/png").with_data(vec![1, 2]))
            .unwrap();
        storage
            .save_contact(StoredContact {
                address: "bob".to_string(),
                profile_name: Some("Bob".to_string()),
                nickname: None,
            })
            .unwrap();

        let tx = storage.read().unwrap();
        assert_eq!(tx.attachment("a1").unwrap().byte_count, 2);
        assert_eq!(tx.display_name("bob").as_deref(), Some("Bob"));
        assert_eq!(tx.display_name("carol"), None);
        drop(tx);

        storage
            .write_with(|tx| tx.delete_attachment(&"a1".to_string()))
            .unwrap();
        assert!(storage.load_attachment("a1").unwrap().is_none());

        // Повторное удаление не ошибка
        storage
            .write_with(|tx| tx.delete_attachment(&"a1".to_string()))
            .unwrap();

        storage.clear_all().unwrap();
        assert!(storage.load_contact("bob").unwrap().is_none());
    }
}

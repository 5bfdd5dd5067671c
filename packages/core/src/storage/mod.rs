//! Модуль хранилища: контракты коллабораторов и in-memory реализация
//!
//! Сообщение не управляет транзакциями само. Любая операция, которая читает
//! или пишет хранилище, принимает явный scope-хэндл:
//!
//! - [`ReadTransaction`]: вложения, справочник имен, строки сообщений
//! - [`WriteTransaction`]: то же плюс запись; один писатель на хранилище
//! - [`TransactionProvider`]: выдает scope'ы; изоляцию обеспечивает он

pub mod memory;
pub mod models;

use crate::message::content::AttachmentId;
use crate::utils::error::Result;
use models::{StoredAttachment, StoredMessage};

pub use memory::MemoryStorage;

/// Хранилище вложений (только чтение записей)
pub trait AttachmentStore {
    /// `None` для висячей ссылки: хранилище вложений живет отдельно и может отставать
    fn attachment(&self, id: &str) -> Option<StoredAttachment>;
}

/// Справочник отображаемых имен для упоминаний
pub trait DisplayNameResolver {
    fn display_name(&self, address: &str) -> Option<String>;
}

/// Read scope
pub trait ReadTransaction: AttachmentStore + DisplayNameResolver {
    fn message(&self, unique_id: &str) -> Result<Option<StoredMessage>>;

    /// Сообщения с `expires_at` в интервале (0, now], по возрастанию `expires_at`
    fn messages_expired_at(&self, now: u64) -> Result<Vec<StoredMessage>>;
}

/// Write scope
pub trait WriteTransaction: ReadTransaction {
    /// Вставить новую строку. Возвращает назначенный sort id.
    fn insert_message(&mut self, row: StoredMessage) -> Result<u64>;

    /// Перезаписать существующую строку
    fn update_message(&mut self, row: StoredMessage) -> Result<()>;

    fn remove_message(&mut self, unique_id: &str) -> Result<()>;

    fn save_attachment(&mut self, attachment: StoredAttachment) -> Result<()>;

    /// Удалить байты вложения. Отсутствующий id не ошибка.
    fn delete_attachment(&mut self, id: &AttachmentId) -> Result<()>;

    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// Источник транзакций
pub trait TransactionProvider {
    type Read<'a>: ReadTransaction
    where
        Self: 'a;
    type Write<'a>: WriteTransaction
    where
        Self: 'a;

    fn read(&self) -> Result<Self::Read<'_>>;

    fn write(&self) -> Result<Self::Write<'_>>;

    /// Выполнить `f` в read scope
    fn read_with<'s, T, F>(&'s self, f: F) -> Result<T>
    where
        F: FnOnce(&Self::Read<'s>) -> Result<T>,
    {
        let tx = self.read()?;
        f(&tx)
    }

    /// Выполнить `f` в write scope; commit только при `Ok`
    fn write_with<'s, T, F>(&'s self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self::Write<'s>) -> Result<T>,
    {
        let mut tx = self.write()?;
        let out = f(&mut tx)?;
        tx.commit()?;
        Ok(out)
    }
}

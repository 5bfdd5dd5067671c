// Публичный API для работы с сообщениями
// Высокоуровневые операции поверх хранилища

pub mod lifecycle;

pub use lifecycle::MessageLifecycleAPI;

use crate::storage::MemoryStorage;

/// Главный API: владеет in-memory хранилищем
pub struct MessengerAPI {
    storage: MemoryStorage,
}

impl MessengerAPI {
    pub fn new() -> Self {
        Self {
            storage: MemoryStorage::new(),
        }
    }

    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    /// Операции жизненного цикла поверх собственного хранилища
    pub fn lifecycle(&self) -> MessageLifecycleAPI<'_, MemoryStorage> {
        MessageLifecycleAPI::new(&self.storage)
    }
}

impl Default for MessengerAPI {
    fn default() -> Self {
        Self::new()
    }
}

// Construct Messages Core
// Модель сообщения: вложения, исчезающие сообщения, view-once, удаление

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod api;
pub mod config;
pub mod message;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use api::{MessageLifecycleAPI, MessengerAPI};
pub use message::{MessageBuilder, MessageEntity, Transition};
pub use storage::MemoryStorage;
pub use utils::error::{ConstructError, Result};

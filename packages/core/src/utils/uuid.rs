// Идентификаторы сообщений: UUID v4 в каноническом виде

use uuid::Uuid;

/// Новый unique id сообщения
pub fn generate_v4() -> String {
    Uuid::new_v4().to_string()
}

/// Канонический вид: lowercase, с дефисами
pub fn is_valid(id: &str) -> bool {
    Uuid::parse_str(id)
        .map(|parsed| parsed.to_string() == id)
        .unwrap_or(false)
}

//! Централизованная конфигурация для Construct Messages
//!
//! Все константы жизненного цикла контента сообщений определены здесь,
//! чтобы избежать хардкода по всему проекту.

use std::sync::OnceLock;

/// Глобальная конфигурация (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // ВЛОЖЕНИЯ
    // ============================================

    /// MIME-тип вложения с "длинным" текстом сообщения
    pub oversize_text_mime_type: String,

    /// Максимальное количество body-вложений в одном сообщении
    pub max_body_attachments: usize,

    // ============================================
    // УПОМИНАНИЯ
    // ============================================

    /// Символ-заглушка, который стоит в raw body на месте упоминания
    pub mention_placeholder: char,

    /// Префикс перед именем в plaintext body
    pub mention_prefix: String,

    /// Имя для упоминания, которое не удалось разрешить через справочник
    pub unknown_mention_name: String,

    // ============================================
    // ВРЕМЕННЫЕ ПАРАМЕТРЫ
    // ============================================

    /// Максимальный таймер исчезающих сообщений (в секундах)
    /// По умолчанию: 4 недели
    pub max_expire_timer_seconds: u32,

    // ============================================
    // ПРЕВЬЮ
    // ============================================

    /// Максимальная длина текста превью (в символах)
    pub preview_body_max_chars: usize,
}

impl Config {
    /// Создать конфигурацию с дефолтными значениями
    pub fn default() -> Self {
        Self {
            // Вложения
            oversize_text_mime_type: "text/x-signal-plain".to_string(),
            max_body_attachments: 32,

            // Упоминания
            mention_placeholder: '\u{FFFC}',
            mention_prefix: "@".to_string(),
            unknown_mention_name: "Unknown".to_string(),

            // Временные параметры
            max_expire_timer_seconds: 4 * 7 * 24 * 60 * 60, // 4 weeks

            // Превью
            preview_body_max_chars: 256,
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Переопределяем значения из env, если они заданы
        if let Ok(val) = std::env::var("MAX_BODY_ATTACHMENTS") {
            if let Ok(parsed) = val.parse() {
                config.max_body_attachments = parsed;
            }
        }

        if let Ok(val) = std::env::var("MAX_EXPIRE_TIMER_SECONDS") {
            if let Ok(parsed) = val.parse() {
                config.max_expire_timer_seconds = parsed;
            }
        }

        if let Ok(val) = std::env::var("PREVIEW_BODY_MAX_CHARS") {
            if let Ok(parsed) = val.parse() {
                config.preview_body_max_chars = parsed;
            }
        }

        if let Ok(val) = std::env::var("OVERSIZE_TEXT_MIME_TYPE") {
            if !val.is_empty() {
                config.oversize_text_mime_type = val;
            }
        }

        config
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию со значениями по умолчанию
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG.set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.oversize_text_mime_type, "text/x-signal-plain");
        assert_eq!(config.max_body_attachments, 32);
        assert_eq!(config.mention_placeholder, '\u{FFFC}');
    }

    #[test]
    fn test_config_values() {
        let config = Config::default();

        // Time params
        assert_eq!(config.max_expire_timer_seconds, 2_419_200);

        // Mentions
        assert_eq!(config.mention_prefix, "@");
        assert_eq!(config.unknown_mention_name, "Unknown");

        assert_eq!(config.preview_body_max_chars, 256);
    }

    #[test]
    fn test_global_is_lazily_initialized() {
        let global = Config::global();
        assert!(Config::is_initialized());
        assert!(global.max_body_attachments > 0);
    }
}

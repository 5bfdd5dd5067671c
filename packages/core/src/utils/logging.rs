// Логирование

use tracing_subscriber::EnvFilter;

/// Установить fmt-подписчика для `tracing`.
///
/// Уровень берется из `RUST_LOG` (по умолчанию `info`). Повторный вызов
/// безопасен: если подписчик уже установлен, ничего не происходит.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}

/// Вариант для тестов: вывод через test writer
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

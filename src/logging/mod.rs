pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use self::config::{FileSinkConfig, LogFormat, LoggingConfig};
pub use filters::build_filter_from_config;
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Инициализация глобального логирования с конфигурацией.
///
/// # Ошибки
/// - [`LoggingError::InvalidDirective`] — директива уровня не разбирается;
/// - [`LoggingError::Io`] — не удалось создать каталог файлового sink'а;
/// - [`LoggingError::AlreadyInitialized`] — глобальный subscriber уже
///   установлен.
pub fn init_logging(mut config: LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers = vec![sinks::console::layer_with_config(&config)];

    let file_guard = match &config.file {
        Some(file) => {
            let (layer, guard) = sinks::file::layer_with_config(&config, file);
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        file_enabled = file_guard.is_some(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}

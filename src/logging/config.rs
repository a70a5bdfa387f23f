use std::{env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::LoggingError;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Запись логов в файл.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSinkConfig {
    pub dir: PathBuf,
    pub filename: String,
}

/// Настройки логирования.
///
/// Переменные окружения `MSGPIPE_LOG_LEVEL` и `MSGPIPE_LOG_FORMAT`
/// перекрывают значения из конфигурации; `RUST_LOG`, если задан, заменяет
/// фильтр целиком.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Уровень или полная директива `EnvFilter`, например
    /// `"info,msgpipe=trace"`.
    pub level: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    /// Файловый sink; `None` — только консоль.
    pub file: Option<FileSinkConfig>,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            filename: "msgpipe.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Применяет `MSGPIPE_LOG_LEVEL` и `MSGPIPE_LOG_FORMAT`.
    ///
    /// Нераспознанный формат игнорируется.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("MSGPIPE_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.level = level.trim().to_string();
            }
        }
        if let Ok(format) = env::var("MSGPIPE_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    /// Директива фильтра, собранная из конфигурации.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            "info".to_string()
        } else {
            level.to_string()
        }
    }

    /// Проверяет, что директива разбирается `EnvFilter`.
    pub fn validate(&self) -> Result<(), LoggingError> {
        let directive = self.build_filter_directive();
        EnvFilter::try_new(&directive)
            .map(|_| ())
            .map_err(|e| LoggingError::InvalidDirective {
                directive,
                reason: e.to_string(),
            })
    }

    /// Создаёт каталог файлового sink'а, если он включён.
    pub fn ensure_log_dir(&self) -> Result<(), LoggingError> {
        if let Some(file) = &self.file {
            std::fs::create_dir_all(&file.dir)?;
        }
        Ok(())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_default_directive_is_info() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.build_filter_directive(), "info");
        assert!(cfg.validate().is_ok());
    }

    /// Тест проверяет, что некорректная директива даёт `InvalidDirective`.
    #[test]
    fn test_invalid_directive_rejected() {
        let cfg = LoggingConfig {
            level: "msgpipe=notalevel".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(LoggingError::InvalidDirective { .. })
        ));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Compact.to_string(), "compact");
    }

    /// Тест проверяет перекрытие уровня и формата переменными окружения.
    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var("MSGPIPE_LOG_LEVEL", "debug");
        env::set_var("MSGPIPE_LOG_FORMAT", "json");
        let mut cfg = LoggingConfig::default();
        cfg.apply_env_overrides();
        env::remove_var("MSGPIPE_LOG_LEVEL");
        env::remove_var("MSGPIPE_LOG_FORMAT");

        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Json);
    }

    #[test]
    fn test_ensure_log_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let cfg = LoggingConfig {
            file: Some(FileSinkConfig {
                dir: dir.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };

        cfg.ensure_log_dir().unwrap();
        assert!(dir.is_dir());
    }
}

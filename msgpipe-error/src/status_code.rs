use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок брокера.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки жизненного цикла (dispose, повторное присваивание)
/// - 3xxx: Конфигурация
/// - 4xxx: IO / окружение
///
/// `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1001,
    Internal = 1002,
    InvalidArgs = 1003,

    // === 2xxx: Жизненный цикл ===
    ObjectDisposed = 2000,
    InvalidOperation = 2001,

    // === 3xxx: Конфигурация ===
    InvalidConfig = 3000,
    MissingConfig = 3001,

    // === 4xxx: IO ===
    Io = 4000,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Ошибка вызвана неправильным использованием API (программная ошибка
    /// вызывающего кода), а не состоянием окружения.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::ObjectDisposed | Self::InvalidOperation | Self::InvalidArgs
        )
    }

    /// Ошибка конфигурации (диапазон 3xxx).
    pub fn is_config_error(&self) -> bool {
        (3000..=3999).contains(&self.code())
    }

    /// Требуется ли логировать как критическую ошибку.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Internal | Self::Unexpected)
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::ObjectDisposed => LogLevel::Debug,
            Self::InvalidArgs | Self::InvalidConfig | Self::MissingConfig => LogLevel::Info,
            Self::Internal | Self::Unexpected => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что ошибки использования API помечаются корректно.
    #[test]
    fn test_usage_errors() {
        assert!(StatusCode::ObjectDisposed.is_usage_error());
        assert!(StatusCode::InvalidOperation.is_usage_error());
        assert!(!StatusCode::Io.is_usage_error());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::ObjectDisposed.code();
        assert_eq!(StatusCode::try_from(n).unwrap(), StatusCode::ObjectDisposed);
        assert!(StatusCode::from_u32(99999).is_none());
    }

    #[test]
    fn test_code_and_into() {
        let n: u32 = StatusCode::InvalidOperation.into();
        assert_eq!(n, 2001);
    }

    #[test]
    fn test_config_range() {
        assert!(StatusCode::InvalidConfig.is_config_error());
        assert!(StatusCode::MissingConfig.is_config_error());
        assert!(!StatusCode::ObjectDisposed.is_config_error());
    }

    /// Тест проверяет отображаемый уровень логирования для разных кодов.
    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::ObjectDisposed.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::Internal.log_level(), LogLevel::Error);
        assert_eq!(StatusCode::InvalidOperation.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::ObjectDisposed);
        assert!(s.contains("2000"), "got: {s}");
        assert!(s.contains("ObjectDisposed"), "got: {s}");
    }
}

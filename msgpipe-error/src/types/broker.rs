use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Структурные ошибки брокера сообщений.
///
/// Ошибки обработчиков сюда не попадают: паника обработчика синхронно
/// раскручивается до вызывающего `publish`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Подписка на брокер, который уже освобождён (политика `Throw`).
    #[error("cannot subscribe: {name} is disposed")]
    UseAfterDispose { name: String },

    /// Повторное присваивание single-assignment disposable.
    #[error("single-assignment disposable was assigned twice")]
    DoubleAssignment,
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UseAfterDispose { .. } => StatusCode::ObjectDisposed,
            Self::DoubleAssignment => StatusCode::InvalidOperation,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "broker".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        if let Self::UseAfterDispose { name } = self {
            tags.push(("broker", name.clone()));
        }

        tags
    }
}

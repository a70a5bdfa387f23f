use std::any::Any;

use msgpipe_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибка инициализации логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },

    #[error("cannot prepare log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("global tracing subscriber already set: {0}")]
    AlreadyInitialized(String),
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidDirective { .. } => StatusCode::InvalidConfig,
            Self::Io(_) => StatusCode::Io,
            Self::AlreadyInitialized(_) => StatusCode::Unexpected,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

use std::any::Any;

use msgpipe_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибка загрузки настроек брокера.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Load(#[from] config::ConfigError),
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Load(config::ConfigError::NotFound(_)) => StatusCode::MissingConfig,
            Self::Load(_) => StatusCode::InvalidConfig,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_missing() {
        let err = ConfigError::from(config::ConfigError::NotFound("key".into()));
        assert_eq!(err.status_code(), StatusCode::MissingConfig);
    }

    #[test]
    fn test_message_maps_to_invalid() {
        let err = ConfigError::from(config::ConfigError::Message("bad".into()));
        assert_eq!(err.status_code(), StatusCode::InvalidConfig);
        assert!(err.to_string().contains("bad"));
    }
}

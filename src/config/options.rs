use config::{Config, Environment, Source};
use msgpipe_error::{PipeResult, ResultExt};
use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, pubsub::DisposedPolicy};

/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "MSGPIPE";

/// Настройки ядра брокера.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerOptions {
    /// Поведение `subscribe` после `dispose` ядра.
    pub disposed_policy: DisposedPolicy,
    /// Сообщать ли события подписок в диагностику.
    pub enable_diagnostics: bool,
}

impl BrokerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disposed_policy(
        mut self,
        policy: DisposedPolicy,
    ) -> Self {
        self.disposed_policy = policy;
        self
    }

    pub fn with_diagnostics(
        mut self,
        enabled: bool,
    ) -> Self {
        self.enable_diagnostics = enabled;
        self
    }

    /// Загружает настройки из окружения (`MSGPIPE_DISPOSED_POLICY`,
    /// `MSGPIPE_ENABLE_DIAGNOSTICS`).
    pub fn load() -> PipeResult<Self> {
        Self::load_from(Environment::with_prefix(ENV_PREFIX))
    }

    /// Загружает настройки из произвольного источника поверх значений по
    /// умолчанию.
    pub fn load_from<S>(source: S) -> PipeResult<Self>
    where
        S: Source + Send + Sync + 'static,
    {
        let cfg = Config::builder()
            .set_default("disposed_policy", "ignore")
            .and_then(|b| b.set_default("enable_diagnostics", false))
            .map_err(ConfigError::from)
            .context("invalid broker option defaults")?
            .add_source(source)
            .build()
            .map_err(ConfigError::from)
            .context("failed to read broker options")?;

        cfg.try_deserialize()
            .map_err(ConfigError::from)
            .context("failed to deserialize broker options")
    }
}

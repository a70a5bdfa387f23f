use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    disposable::{Disposable, DisposableBag},
    error::BrokerError,
};

/// Поведение `subscribe` на уже освобождённом ядре брокера.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisposedPolicy {
    /// Вернуть пустой токен; его `dispose` безвреден.
    #[default]
    Ignore,
    /// Вернуть [`BrokerError::UseAfterDispose`] с именем ядра.
    Throw,
}

impl DisposedPolicy {
    /// Решение для подписки на освобождённое ядро `name`.
    pub fn handle(
        self,
        name: &str,
    ) -> Result<Box<dyn Disposable>, BrokerError> {
        match self {
            Self::Ignore => Ok(DisposableBag::empty()),
            Self::Throw => {
                warn!(broker = name, "subscribe rejected: broker is disposed");
                Err(BrokerError::UseAfterDispose {
                    name: name.to_string(),
                })
            }
        }
    }
}

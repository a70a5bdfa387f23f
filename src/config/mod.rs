//! Настройки брокера.
//!
//! Загружаются из переменных окружения с префиксом `MSGPIPE_` и
//! неизменяемы после создания ядра.

pub mod options;

pub use options::BrokerOptions;

//! Подсистема Publish–Subscribe (pub/sub).
//!
//! Внутрипроцессный брокер типизированных сообщений:
//!
//! - `free_list`: реестр слотов с повторным использованием индексов и
//!   снимком для обхода без блокировки.
//! - `keyless`: ядро с одним каналом на тип сообщения.
//! - `keyed`: ядро с маршрутизацией по ключу и удалением пустых ключей.
//! - `broker`: клонируемые фасады и трейты издателя/подписчика.
//! - `handler`: обработчики сообщений и фильтр-предикат.
//! - `policy`: поведение подписки на освобождённое ядро.
//! - `diagnostics`: приёмники событий жизненного цикла подписок.

pub mod broker;
pub mod diagnostics;
pub mod free_list;
pub mod handler;
pub mod keyed;
pub mod keyless;
pub mod policy;

pub use broker::*;
pub use diagnostics::{
    Diagnostics, HolderId, NoopDiagnostics, SubscriptionDiagnostics, SubscriptionId,
};
pub use free_list::FreeList;
pub use handler::{MessageHandler, PredicateHandler};
pub use keyed::KeyedMessageBrokerCore;
pub use keyless::MessageBrokerCore;
pub use policy::DisposedPolicy;

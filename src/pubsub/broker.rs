use std::{borrow::Borrow, hash::Hash, sync::Arc};

use super::{
    Diagnostics, KeyedMessageBrokerCore, MessageBrokerCore, MessageHandler, PredicateHandler,
};
use crate::{config::BrokerOptions, disposable::Disposable, error::BrokerError};

/// Сторона издателя канала без ключа.
pub trait Publisher<M> {
    fn publish(
        &self,
        message: &M,
    );
}

/// Сторона подписчика канала без ключа.
pub trait Subscriber<M> {
    /// Регистрирует обработчик и возвращает токен подписки.
    ///
    /// Токен не освобождается сам при `Drop`: отписка выполняется явным
    /// `dispose` (или через [`DisposableExt::dispose_on_drop`]).
    ///
    /// [`DisposableExt::dispose_on_drop`]: crate::disposable::DisposableExt::dispose_on_drop
    fn subscribe(
        &self,
        handler: Arc<dyn MessageHandler<M>>,
    ) -> Result<Box<dyn Disposable>, BrokerError>;
}

/// Сторона издателя канала с ключом.
pub trait KeyedPublisher<K, M> {
    fn publish(
        &self,
        key: &K,
        message: &M,
    );
}

/// Сторона подписчика канала с ключом.
pub trait KeyedSubscriber<K, M> {
    fn subscribe(
        &self,
        key: K,
        handler: Arc<dyn MessageHandler<M>>,
    ) -> Result<Box<dyn Disposable>, BrokerError>;
}

/// Подписка замыканиями.
pub trait SubscriberExt<M: 'static>: Subscriber<M> {
    fn subscribe_fn<F>(
        &self,
        handler: F,
    ) -> Result<Box<dyn Disposable>, BrokerError>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler))
    }

    /// Подписка, получающая только сообщения, для которых `predicate`
    /// возвращает `true`.
    fn subscribe_where<P, F>(
        &self,
        predicate: P,
        handler: F,
    ) -> Result<Box<dyn Disposable>, BrokerError>
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(PredicateHandler::new(predicate, Arc::new(handler))))
    }
}

impl<M: 'static, S: Subscriber<M> + ?Sized> SubscriberExt<M> for S {}

/// Подписка замыканиями для канала с ключом.
pub trait KeyedSubscriberExt<K, M: 'static>: KeyedSubscriber<K, M> {
    fn subscribe_fn<F>(
        &self,
        key: K,
        handler: F,
    ) -> Result<Box<dyn Disposable>, BrokerError>
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(key, Arc::new(handler))
    }

    fn subscribe_where<P, F>(
        &self,
        key: K,
        predicate: P,
        handler: F,
    ) -> Result<Box<dyn Disposable>, BrokerError>
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
        F: Fn(&M) + Send + Sync + 'static,
    {
        self.subscribe(
            key,
            Arc::new(PredicateHandler::new(predicate, Arc::new(handler))),
        )
    }
}

impl<K, M: 'static, S: KeyedSubscriber<K, M> + ?Sized> KeyedSubscriberExt<K, M> for S {}

/// Брокер сообщений типа `M` без ключа.
///
/// Дешёвый в клонировании дескриптор над [`MessageBrokerCore`]: все клоны
/// разделяют одно ядро, а ядро освобождается, когда уходит последний клон
/// (или явно через [`MessageBroker::dispose`]).
pub struct MessageBroker<M: 'static> {
    core: Arc<MessageBrokerCore<M>>,
}

impl<M: 'static> MessageBroker<M> {
    pub fn new(options: &BrokerOptions) -> Self {
        Self {
            core: Arc::new(MessageBrokerCore::new(options)),
        }
    }

    pub fn with_diagnostics(
        diagnostics: Arc<dyn Diagnostics>,
        options: &BrokerOptions,
    ) -> Self {
        Self {
            core: Arc::new(MessageBrokerCore::with_diagnostics(diagnostics, options)),
        }
    }

    /// Освобождает ядро для всех клонов.
    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn core(&self) -> &MessageBrokerCore<M> {
        &self.core
    }
}

impl<M: 'static> Clone for MessageBroker<M> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<M: 'static> Default for MessageBroker<M> {
    fn default() -> Self {
        Self::new(&BrokerOptions::default())
    }
}

impl<M: 'static> std::fmt::Debug for MessageBroker<M> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.core.as_ref(), f)
    }
}

impl<M: 'static> Publisher<M> for MessageBroker<M> {
    fn publish(
        &self,
        message: &M,
    ) {
        self.core.publish(message);
    }
}

impl<M: 'static> Subscriber<M> for MessageBroker<M> {
    fn subscribe(
        &self,
        handler: Arc<dyn MessageHandler<M>>,
    ) -> Result<Box<dyn Disposable>, BrokerError> {
        self.core.subscribe(handler)
    }
}

/// Брокер сообщений типа `M` с маршрутизацией по ключу `K`.
pub struct KeyedMessageBroker<K, M: 'static>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    core: Arc<KeyedMessageBrokerCore<K, M>>,
}

impl<K, M: 'static> KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(options: &BrokerOptions) -> Self {
        Self {
            core: Arc::new(KeyedMessageBrokerCore::new(options)),
        }
    }

    pub fn with_diagnostics(
        diagnostics: Arc<dyn Diagnostics>,
        options: &BrokerOptions,
    ) -> Self {
        Self {
            core: Arc::new(KeyedMessageBrokerCore::with_diagnostics(
                diagnostics,
                options,
            )),
        }
    }

    /// Публикация по заимствованному ключу, например `&str` для
    /// `K = String`.
    pub fn publish_by<Q>(
        &self,
        key: &Q,
        message: &M,
    ) where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.publish(key, message);
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn core(&self) -> &KeyedMessageBrokerCore<K, M> {
        &self.core
    }
}

impl<K, M: 'static> Clone for KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<K, M: 'static> Default for KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(&BrokerOptions::default())
    }
}

impl<K, M: 'static> std::fmt::Debug for KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        std::fmt::Debug::fmt(self.core.as_ref(), f)
    }
}

impl<K, M: 'static> KeyedPublisher<K, M> for KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn publish(
        &self,
        key: &K,
        message: &M,
    ) {
        self.core.publish(key, message);
    }
}

impl<K, M: 'static> KeyedSubscriber<K, M> for KeyedMessageBroker<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn subscribe(
        &self,
        key: K,
        handler: Arc<dyn MessageHandler<M>>,
    ) -> Result<Box<dyn Disposable>, BrokerError> {
        self.core.subscribe(key, handler)
    }
}

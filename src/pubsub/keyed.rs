use std::{
    borrow::Borrow,
    collections::HashMap,
    hash::Hash,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    diagnostics::{Diagnostics, HolderId, NoopDiagnostics, SubscriptionId},
    DisposedPolicy, FreeList, MessageHandler,
};
use crate::{config::BrokerOptions, disposable::Disposable, error::BrokerError};

const NAME: &str = "KeyedMessageBrokerCore";

type Handler<M> = Arc<dyn MessageHandler<M>>;

/// Ядро брокера с маршрутизацией по ключу.
///
/// Каждому ключу соответствует свой holder с собственным
/// реестром. Ключ присутствует в таблице тогда и только тогда, когда у его
/// holder'а есть хотя бы одна живая подписка: пустой holder удаляется сразу
/// при последней отписке.
///
/// Один мьютекс защищает и таблицу ключей, и реестры всех holder'ов.
pub struct KeyedMessageBrokerCore<K, M: 'static>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    inner: Arc<KeyedInner<K, M>>,
}

struct KeyedInner<K, M: 'static> {
    state: Mutex<KeyedState<K, M>>,
    diagnostics: Arc<dyn Diagnostics>,
    policy: DisposedPolicy,
}

struct KeyedState<K, M: 'static> {
    holders: HashMap<K, HandlerHolder<M>, RandomState>,
    disposed: bool,
}

/// Реестр обработчиков одного ключа.
struct HandlerHolder<M: 'static> {
    id: HolderId,
    handlers: FreeList<Handler<M>>,
}

/// Токен подписки на [`KeyedMessageBrokerCore`].
///
/// Помимо индекса слота хранит ключ и идентификатор holder'а, которому
/// принадлежит слот.
struct KeyedSubscription<K, M: 'static> {
    core: Weak<KeyedInner<K, M>>,
    key: K,
    holder: HolderId,
    index: usize,
    id: SubscriptionId,
    disposed: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<K, M: 'static> KeyedMessageBrokerCore<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    pub fn new(options: &BrokerOptions) -> Self {
        Self::with_diagnostics(Arc::new(NoopDiagnostics), options)
    }

    /// Создаёт ядро с приёмником диагностики. Если диагностика выключена в
    /// `options`, приёмник игнорируется.
    pub fn with_diagnostics(
        diagnostics: Arc<dyn Diagnostics>,
        options: &BrokerOptions,
    ) -> Self {
        let diagnostics: Arc<dyn Diagnostics> = if options.enable_diagnostics {
            diagnostics
        } else {
            Arc::new(NoopDiagnostics)
        };

        Self {
            inner: Arc::new(KeyedInner {
                state: Mutex::new(KeyedState {
                    holders: HashMap::with_hasher(RandomState::new()),
                    disposed: false,
                }),
                diagnostics,
                policy: options.disposed_policy,
            }),
        }
    }

    /// Доставляет `message` обработчикам ключа `key`.
    ///
    /// Публикация в ключ без подписчиков, как и публикация после
    /// `dispose`, ничего не делает.
    pub fn publish<Q>(
        &self,
        key: &Q,
        message: &M,
    ) where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let snapshot = {
            let mut state = self.inner.state.lock();
            match state.holders.get_mut(key) {
                Some(holder) => holder.handlers.values(),
                None => return,
            }
        };

        for handler in snapshot.iter().flatten() {
            handler.handle(message);
        }
    }

    /// Регистрирует обработчик для ключа `key`, создавая holder при первой
    /// подписке на этот ключ.
    ///
    /// # Ошибки
    /// [`BrokerError::UseAfterDispose`] после `dispose` при политике
    /// [`DisposedPolicy::Throw`].
    pub fn subscribe(
        &self,
        key: K,
        handler: Handler<M>,
    ) -> Result<Box<dyn Disposable>, BrokerError> {
        // Устаревший обработчик из переиспользованной ячейки уничтожается
        // только после снятия блокировки: его `Drop` может отписываться от
        // этого же ядра.
        let (subscription, _stale) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return self.inner.policy.handle(NAME);
            }

            let holder = state
                .holders
                .entry(key.clone())
                .or_insert_with(|| HandlerHolder {
                    id: HolderId::next(),
                    handlers: FreeList::new(),
                });
            let Some((index, stale)) = holder.handlers.add(handler) else {
                return self.inner.policy.handle(NAME);
            };
            let holder_id = holder.id;
            let id = SubscriptionId::next();
            self.inner.diagnostics.increment_subscribe(holder_id, id);
            trace!(holder = %holder_id, index, subscription = %id, "keyed handler subscribed");

            let subscription = KeyedSubscription {
                core: Arc::downgrade(&self.inner),
                key,
                holder: holder_id,
                index,
                id,
                disposed: AtomicBool::new(false),
            };
            (subscription, stale)
        };

        Ok(Box::new(subscription))
    }

    /// Освобождает ядро и все holder'ы. Повторные вызовы ничего не делают.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Есть ли у ключа хотя бы одна живая подписка.
    pub fn contains_key<Q>(
        &self,
        key: &Q,
    ) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.state.lock().holders.contains_key(key)
    }

    /// Число ключей с живыми подписками.
    pub fn key_count(&self) -> usize {
        self.inner.state.lock().holders.len()
    }

    /// Число живых подписок на ключ.
    pub fn subscriber_count<Q>(
        &self,
        key: &Q,
    ) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner
            .state
            .lock()
            .holders
            .get(key)
            .map_or(0, |holder| holder.handlers.len())
    }

    /// Снимок ключей с живыми подписками.
    pub fn keys(&self) -> Vec<K> {
        self.inner.state.lock().holders.keys().cloned().collect()
    }
}

impl<K, M: 'static> KeyedInner<K, M> {
    fn dispose(&self) {
        let mut retired = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.holders)
        };

        let keys = retired.len();
        for holder in retired.values_mut() {
            holder.retire(self.diagnostics.as_ref());
        }
        debug!(keys, "keyed message broker disposed");
    }
}

impl<M: 'static> HandlerHolder<M> {
    /// Освобождает реестр и сообщает итоговое число подписок.
    fn retire(
        &mut self,
        diagnostics: &dyn Diagnostics,
    ) {
        if let Some(count) = self.handlers.try_dispose() {
            diagnostics.remove_target_diagnostics(self.id, count);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<K, M: 'static> Drop for KeyedMessageBrokerCore<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<K, M: 'static> std::fmt::Debug for KeyedMessageBrokerCore<K, M>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct(NAME)
            .field("keys", &state.holders.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<K, M: 'static> Disposable for KeyedSubscription<K, M>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(core) = self.core.upgrade() else {
            return;
        };

        // Пустой holder уничтожается вместе со своими устаревшими ячейками
        // уже после снятия блокировки.
        let pruned = {
            let mut state = core.state.lock();
            if state.disposed {
                return;
            }
            let Some(holder) = state.holders.get_mut(&self.key) else {
                return;
            };
            if holder.id != self.holder {
                return;
            }

            holder.handlers.remove(self.index, false);
            core.diagnostics.decrement_subscribe(self.holder, self.id);
            if holder.handlers.is_empty() {
                state.holders.remove(&self.key)
            } else {
                None
            }
        };
        trace!(holder = %self.holder, index = self.index, subscription = %self.id, "keyed handler unsubscribed");

        if let Some(mut holder) = pruned {
            holder.retire(core.diagnostics.as_ref());
            trace!(holder = %self.holder, "empty key pruned");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

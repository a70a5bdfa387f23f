use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::{
    diagnostics::{Diagnostics, HolderId, NoopDiagnostics, SubscriptionId},
    DisposedPolicy, FreeList, MessageHandler,
};
use crate::{config::BrokerOptions, disposable::Disposable, error::BrokerError};

const NAME: &str = "MessageBrokerCore";

type Handler<M> = Arc<dyn MessageHandler<M>>;

/// Ядро брокера без ключа: один канал на тип сообщения.
///
/// Все подписчики делят один [`FreeList`]. Структурные изменения
/// (подписка, отписка, `dispose`) сериализуются одним мьютексом; `publish`
/// берёт его только на время получения снимка и вызывает обработчики уже
/// без блокировки, поэтому обработчик может подписываться и отписываться
/// реентерабельно.
///
/// При `Drop` ядро освобождается так же, как при явном [`dispose`].
///
/// [`dispose`]: MessageBrokerCore::dispose
pub struct MessageBrokerCore<M: 'static> {
    inner: Arc<CoreInner<M>>,
}

struct CoreInner<M: 'static> {
    id: HolderId,
    state: Mutex<CoreState<M>>,
    diagnostics: Arc<dyn Diagnostics>,
    policy: DisposedPolicy,
}

struct CoreState<M: 'static> {
    handlers: FreeList<Handler<M>>,
    disposed: bool,
}

/// Токен подписки на [`MessageBrokerCore`].
struct Subscription<M: 'static> {
    core: Weak<CoreInner<M>>,
    index: usize,
    id: SubscriptionId,
    disposed: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<M: 'static> MessageBrokerCore<M> {
    /// Создаёт ядро без диагностики.
    pub fn new(options: &BrokerOptions) -> Self {
        Self::with_diagnostics(Arc::new(NoopDiagnostics), options)
    }

    /// Создаёт ядро, сообщающее события подписок в `diagnostics`, если
    /// диагностика включена в `options`.
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
            inner: Arc::new(CoreInner {
                id: HolderId::next(),
                state: Mutex::new(CoreState {
                    handlers: FreeList::new(),
                    disposed: false,
                }),
                diagnostics,
                policy: options.disposed_policy,
            }),
        }
    }

    /// Идентификатор реестра этого ядра в диагностике.
    pub fn holder_id(&self) -> HolderId {
        self.inner.id
    }

    /// Доставляет `message` всем обработчикам, живым на момент снимка, в
    /// порядке слотов.
    ///
    /// После `dispose` ничего не делает.
    pub fn publish(
        &self,
        message: &M,
    ) {
        let snapshot = self.inner.state.lock().handlers.values();
        for handler in snapshot.iter().flatten() {
            handler.handle(message);
        }
    }

    /// Регистрирует обработчик.
    ///
    /// # Ошибки
    /// [`BrokerError::UseAfterDispose`], если ядро освобождено и выбрана
    /// политика [`DisposedPolicy::Throw`].
    pub fn subscribe(
        &self,
        handler: Handler<M>,
    ) -> Result<Box<dyn Disposable>, BrokerError> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return self.inner.policy.handle(NAME);
        }

        // Ячейки здесь стираются при отписке, вытеснять нечего.
        let Some((index, _)) = state.handlers.add(handler) else {
            return self.inner.policy.handle(NAME);
        };
        let id = SubscriptionId::next();
        self.inner.diagnostics.increment_subscribe(self.inner.id, id);
        trace!(holder = %self.inner.id, index, subscription = %id, "handler subscribed");

        Ok(Box::new(Subscription {
            core: Arc::downgrade(&self.inner),
            index,
            id,
            disposed: AtomicBool::new(false),
        }))
    }

    /// Освобождает ядро. Повторные вызовы ничего не делают.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Число живых подписок.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().handlers.len()
    }

    /// Длина реестра обработчиков, включая свободные слоты.
    pub fn capacity(&self) -> usize {
        self.inner.state.lock().handlers.capacity()
    }
}

impl<M: 'static> CoreInner<M> {
    fn dispose(&self) {
        // Обработчики уничтожаются уже после снятия блокировки.
        let mut retired = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.handlers)
        };

        if let Some(count) = retired.try_dispose() {
            self.diagnostics.remove_target_diagnostics(self.id, count);
            debug!(holder = %self.id, final_count = count, "message broker disposed");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl<M: 'static> Drop for MessageBrokerCore<M> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<M: 'static> std::fmt::Debug for MessageBrokerCore<M> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct(NAME)
            .field("holder", &self.inner.id)
            .field("subscribers", &state.handlers.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<M: 'static> Disposable for Subscription<M> {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(core) = self.core.upgrade() else {
            return;
        };

        let erased = {
            let mut state = core.state.lock();
            if state.disposed {
                return;
            }
            let erased = state.handlers.remove(self.index, true);
            core.diagnostics.decrement_subscribe(core.id, self.id);
            erased
        };
        trace!(holder = %core.id, index = self.index, subscription = %self.id, "handler unsubscribed");
        drop(erased);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::pubsub::SubscriptionDiagnostics;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Handler<String>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &'static str| -> Handler<String> {
                let log = Arc::clone(&log);
                Arc::new(move |m: &String| log.lock().push(format!("{tag}:{m}")))
            }
        };
        (log, make)
    }

    /// Тест проверяет доставку всем подписчикам в порядке подписки.
    #[test]
    fn test_publish_in_slot_order() {
        let core = MessageBrokerCore::new(&BrokerOptions::default());
        let (log, make) = recorder();

        let _t1 = core.subscribe(make("a")).unwrap();
        let _t2 = core.subscribe(make("b")).unwrap();
        let _t3 = core.subscribe(make("c")).unwrap();

        core.publish(&"x".to_string());
        assert_eq!(*log.lock(), vec!["a:x", "b:x", "c:x"]);
    }

    /// Тест проверяет, что повторный `dispose` токена не уменьшает счётчик
    /// дважды.
    #[test]
    fn test_token_dispose_is_idempotent() {
        let diag = Arc::new(SubscriptionDiagnostics::new());
        let core = MessageBrokerCore::with_diagnostics(
            diag.clone(),
            &BrokerOptions::default().with_diagnostics(true),
        );
        let (_, make) = recorder();

        let t1 = core.subscribe(make("a")).unwrap();
        let _t2 = core.subscribe(make("b")).unwrap();
        assert_eq!(diag.subscribe_count(), 2);

        t1.dispose();
        t1.dispose();
        assert_eq!(core.subscriber_count(), 1);
        assert_eq!(diag.subscribe_count(), 1);
        assert_eq!(diag.count_for(core.holder_id()), 1);
    }

    /// Тест проверяет, что выключенная диагностика ничего не получает.
    #[test]
    fn test_diagnostics_disabled_by_options() {
        let diag = Arc::new(SubscriptionDiagnostics::new());
        let core = MessageBrokerCore::<String>::with_diagnostics(diag.clone(), &BrokerOptions::default());
        let (_, make) = recorder();

        let _t = core.subscribe(make("a")).unwrap();
        assert_eq!(diag.subscribe_count(), 0);
    }

    /// Тест проверяет, что `dispose` ядра сообщает итоговое число подписок
    /// один раз.
    #[test]
    fn test_core_dispose_reports_final_count_once() {
        let diag = Arc::new(SubscriptionDiagnostics::new());
        let core = MessageBrokerCore::with_diagnostics(
            diag.clone(),
            &BrokerOptions::default().with_diagnostics(true),
        );
        let (log, make) = recorder();
        let t1 = core.subscribe(make("a")).unwrap();
        let _t2 = core.subscribe(make("b")).unwrap();

        core.dispose();
        core.dispose();
        assert!(core.is_disposed());
        assert_eq!(diag.subscribe_count(), 0);
        assert_eq!(diag.holder_count(), 0);

        // Токен после dispose ядра — no-op.
        t1.dispose();
        assert_eq!(diag.subscribe_count(), 0);

        core.publish(&"late".to_string());
        assert!(log.lock().is_empty());
    }

    /// Тест проверяет, что освобождённый слот используется повторно.
    #[test]
    fn test_slot_reuse_keeps_capacity() {
        let core = MessageBrokerCore::new(&BrokerOptions::default());
        let (_, make) = recorder();

        let tokens: Vec<_> = (0..8).map(|_| core.subscribe(make("x")).unwrap()).collect();
        tokens.iter().for_each(|t| t.dispose());
        let _again: Vec<_> = (0..8).map(|_| core.subscribe(make("y")).unwrap()).collect();

        assert_eq!(core.capacity(), 8);
        assert_eq!(core.subscriber_count(), 8);
    }

    /// Тест проверяет, что обработчик может отписаться во время `publish`
    /// без взаимоблокировки.
    #[test]
    fn test_reentrant_unsubscribe_from_handler() {
        let core = Arc::new(MessageBrokerCore::<u32>::new(&BrokerOptions::default()));
        let slot = Arc::new(crate::disposable::SingleAssignmentDisposable::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handler: Handler<u32> = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            Arc::new(move |_: &u32| {
                calls.fetch_add(1, Ordering::SeqCst);
                slot.dispose();
            })
        };
        slot.set(core.subscribe(handler).unwrap()).unwrap();

        core.publish(&1);
        core.publish(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(core.subscriber_count(), 0);
    }

    /// Тест проверяет, что токен, переживший ядро, безопасно освобождается.
    #[test]
    fn test_token_outlives_core() {
        let core = MessageBrokerCore::<String>::new(&BrokerOptions::default());
        let (_, make) = recorder();
        let token = core.subscribe(make("a")).unwrap();
        drop(core);
        token.dispose();
    }
}

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use msgpipe::{
    BrokerError, BrokerOptions, Disposable, DisposableBag, DisposableExt, DisposedPolicy,
    KeyedMessageBroker, KeyedPublisher, KeyedSubscriberExt, MessageBroker, Publisher,
    SingleAssignmentDisposable, SubscriberExt, SubscriptionDiagnostics,
};
use rstest::rstest;

/// Журнал вызовов обработчиков вида `"h1:x"`.
#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn handler(
        &self,
        name: &'static str,
    ) -> impl Fn(&String) + Send + Sync + 'static {
        let log = self.0.clone();
        move |m: &String| log.lock().unwrap().push(format!("{name}:{m}"))
    }

    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Тест проверяет сквозной сценарий: две подписки, отписка одной,
/// освобождение ядра, подписка и публикация после освобождения.
#[test]
fn test_keyless_lifecycle_scenario() {
    let broker = MessageBroker::<String>::new(&BrokerOptions::default());
    let log = CallLog::default();

    let t1 = broker.subscribe_fn(log.handler("h1")).unwrap();
    let _t2 = broker.subscribe_fn(log.handler("h2")).unwrap();

    broker.publish(&"x".to_string());
    assert_eq!(log.take(), vec!["h1:x", "h2:x"]);

    t1.dispose();
    broker.publish(&"y".to_string());
    assert_eq!(log.take(), vec!["h2:y"]);

    broker.dispose();
    let t3 = broker.subscribe_fn(log.handler("h3")).unwrap();
    broker.publish(&"z".to_string());
    assert!(log.take().is_empty());

    t3.dispose();
    t3.dispose();
}

/// Тест проверяет, что каждый из N подписчиков получает сообщение ровно
/// один раз и в порядке подписки.
#[rstest]
#[case(1)]
#[case(3)]
#[case(64)]
fn test_delivery_in_subscription_order(#[case] n: usize) {
    let broker = MessageBroker::<usize>::default();
    let order = Arc::new(Mutex::new(Vec::new()));

    let _tokens: Vec<_> = (0..n)
        .map(|i| {
            let order = order.clone();
            broker
                .subscribe_fn(move |m: &usize| order.lock().unwrap().push((i, *m)))
                .unwrap()
        })
        .collect();

    broker.publish(&42);

    let expected: Vec<_> = (0..n).map(|i| (i, 42)).collect();
    assert_eq!(*order.lock().unwrap(), expected);
}

/// Тест проверяет, что повторная отписка не уменьшает счётчик дважды.
#[test]
fn test_double_dispose_single_decrement() {
    let diag = Arc::new(SubscriptionDiagnostics::new());
    let broker = MessageBroker::<String>::with_diagnostics(
        diag.clone(),
        &BrokerOptions::default().with_diagnostics(true),
    );
    let log = CallLog::default();

    let t1 = broker.subscribe_fn(log.handler("h1")).unwrap();
    let _t2 = broker.subscribe_fn(log.handler("h2")).unwrap();

    t1.dispose();
    t1.dispose();

    assert_eq!(diag.subscribe_count(), 1);
    assert_eq!(broker.core().subscriber_count(), 1);
}

/// Тест проверяет контракт политики для освобождённого ядра.
#[rstest]
#[case::ignore(DisposedPolicy::Ignore)]
#[case::throw(DisposedPolicy::Throw)]
fn test_disposed_policy_contract(#[case] policy: DisposedPolicy) {
    let options = BrokerOptions::default().with_disposed_policy(policy);
    let broker = MessageBroker::<String>::new(&options);
    let keyed = KeyedMessageBroker::<String, String>::new(&options);
    let hits = Arc::new(AtomicUsize::new(0));

    broker.dispose();
    keyed.dispose();

    let counter = |hits: &Arc<AtomicUsize>| {
        let hits = hits.clone();
        move |_: &String| {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    };
    let plain = broker.subscribe_fn(counter(&hits));
    let by_key = keyed.subscribe_fn("k".to_string(), counter(&hits));

    match policy {
        DisposedPolicy::Ignore => {
            let (plain, by_key) = (plain.unwrap(), by_key.unwrap());
            broker.publish(&"m".to_string());
            keyed.publish(&"k".to_string(), &"m".to_string());
            plain.dispose();
            by_key.dispose();
            assert_eq!(hits.load(Ordering::SeqCst), 0);
        }
        DisposedPolicy::Throw => {
            assert_eq!(
                plain.err(),
                Some(BrokerError::UseAfterDispose {
                    name: "MessageBrokerCore".to_string()
                })
            );
            assert_eq!(
                by_key.err(),
                Some(BrokerError::UseAfterDispose {
                    name: "KeyedMessageBrokerCore".to_string()
                })
            );
        }
    }
}

/// Тест проверяет изоляцию ключей и удаление пустого ключа.
#[test]
fn test_keyed_isolation_and_pruning() {
    let broker = KeyedMessageBroker::<String, String>::default();
    let log = CallLog::default();

    let ta = broker.subscribe_fn("a".to_string(), log.handler("a")).unwrap();
    let _tb = broker.subscribe_fn("b".to_string(), log.handler("b")).unwrap();

    broker.publish_by("a", &"1".to_string());
    assert_eq!(log.take(), vec!["a:1"]);

    ta.dispose();
    assert!(!broker.core().contains_key("a"));
    assert_eq!(broker.core().key_count(), 1);

    broker.publish_by("a", &"2".to_string());
    assert!(log.take().is_empty());

    // Ключ создаётся заново, как новый.
    let _ta2 = broker.subscribe_fn("a".to_string(), log.handler("a2")).unwrap();
    broker.publish_by("a", &"3".to_string());
    assert_eq!(log.take(), vec!["a2:3"]);
    assert_eq!(broker.core().subscriber_count("a"), 1);
}

/// Тест проверяет, что пакет токенов отписывает всё разом.
#[test]
fn test_bag_disposes_many_subscriptions() {
    let broker = MessageBroker::<String>::default();
    let log = CallLog::default();

    let mut bag = DisposableBag::builder();
    broker.subscribe_fn(log.handler("h1")).unwrap().add_to(&mut bag);
    broker.subscribe_fn(log.handler("h2")).unwrap().add_to(&mut bag);
    let bag = bag.build();

    broker.publish(&"x".to_string());
    bag.dispose();
    broker.publish(&"y".to_string());

    assert_eq!(log.take(), vec!["h1:x", "h2:x"]);
    assert_eq!(broker.core().subscriber_count(), 0);
}

/// Тест проверяет, что подписки, присвоенные уже освобождённому слоту,
/// отписываются сразу и не получают сообщений.
#[test]
fn test_single_assignment_disposed_slot_unsubscribes() {
    let broker = MessageBroker::<String>::default();
    let log = CallLog::default();
    let slot = SingleAssignmentDisposable::new();
    slot.dispose();

    assert!(broker.subscribe_fn(log.handler("first")).unwrap().set_to(&slot).is_ok());
    assert!(broker.subscribe_fn(log.handler("second")).unwrap().set_to(&slot).is_ok());
    broker.publish(&"x".to_string());

    assert!(log.take().is_empty());
    assert_eq!(broker.core().subscriber_count(), 0);
}

/// Тест проверяет отписку через guard при выходе из области видимости.
#[test]
fn test_dispose_on_drop_guard() {
    let broker = MessageBroker::<String>::default();
    let log = CallLog::default();

    {
        let _guard = broker
            .subscribe_fn(log.handler("scoped"))
            .unwrap()
            .dispose_on_drop();
        broker.publish(&"in".to_string());
    }
    broker.publish(&"out".to_string());

    assert_eq!(log.take(), vec!["scoped:in"]);
}

/// Тест проверяет, что диагностика видит отдельный holder на каждый ключ
/// и снимает его при удалении ключа.
#[test]
fn test_keyed_diagnostics_per_key() {
    let diag = Arc::new(SubscriptionDiagnostics::new());
    let broker = KeyedMessageBroker::<u32, String>::with_diagnostics(
        diag.clone(),
        &BrokerOptions::default().with_diagnostics(true),
    );
    let log = CallLog::default();

    let t1 = broker.subscribe_fn(1, log.handler("one")).unwrap();
    let t2 = broker.subscribe_fn(2, log.handler("two")).unwrap();
    let _t3 = broker.subscribe_fn(2, log.handler("two-bis")).unwrap();
    assert_eq!(diag.holder_count(), 2);
    assert_eq!(diag.subscribe_count(), 3);

    t1.dispose();
    t2.dispose();
    assert_eq!(diag.holder_count(), 1);
    assert_eq!(diag.subscribe_count(), 1);

    drop(broker);
    assert_eq!(diag.holder_count(), 0);
    assert_eq!(diag.subscribe_count(), 0);
}

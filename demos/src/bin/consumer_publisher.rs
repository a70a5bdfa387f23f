use std::{fmt, sync::Arc};

use msgpipe::{
    init_logging, BrokerOptions, Disposable, DisposableBag, DisposableExt, KeyedMessageBroker,
    KeyedPublisher, KeyedSubscriberExt, LoggingConfig, MessageBroker, Publisher, Subscriber,
    SubscriberExt, SubscriptionDiagnostics,
};
use parking_lot::Mutex;
use uuid::Uuid;

/// Событие с уникальным идентификатором.
#[derive(Debug, Clone)]
struct SomeEvent {
    id: Uuid,
    priority: u8,
}

impl SomeEvent {
    fn new(priority: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
        }
    }
}

impl fmt::Display for SomeEvent {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} (priority {})", self.id, self.priority)
    }
}

/// Потребитель: держит все свои подписки в одном составном токене.
struct Consumer {
    name: &'static str,
    seen: Arc<Mutex<Vec<Uuid>>>,
    subscriptions: Box<dyn Disposable>,
}

impl Consumer {
    fn new<S>(
        name: &'static str,
        subscriber: &S,
    ) -> anyhow::Result<Self>
    where
        S: Subscriber<SomeEvent>,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposableBag::builder();

        let log = seen.clone();
        subscriber
            .subscribe_fn(move |event: &SomeEvent| {
                log.lock().push(event.id);
                tracing::info!(consumer = name, %event, "event received");
            })?
            .add_to(&mut bag);

        subscriber
            .subscribe_where(
                |event: &SomeEvent| event.priority > 5,
                move |event: &SomeEvent| {
                    tracing::warn!(consumer = name, %event, "high priority event");
                },
            )?
            .add_to(&mut bag);

        Ok(Self {
            name,
            seen,
            subscriptions: bag.build(),
        })
    }

    fn received(&self) -> usize {
        self.seen.lock().len()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.subscriptions.dispose();
        println!("{} unsubscribed after {} events", self.name, self.received());
    }
}

/// Издатель: знает только сторону публикации.
struct EventPublisher<P: Publisher<SomeEvent>> {
    publisher: P,
}

impl<P: Publisher<SomeEvent>> EventPublisher<P> {
    fn send(
        &self,
        priority: u8,
    ) -> SomeEvent {
        let event = SomeEvent::new(priority);
        self.publisher.publish(&event);
        event
    }
}

fn main() -> anyhow::Result<()> {
    let logging = init_logging(LoggingConfig::default())?;

    println!("=== Keyless broker ===\n");

    let diagnostics = Arc::new(SubscriptionDiagnostics::new());
    let options = BrokerOptions::load()?.with_diagnostics(true);
    let broker = MessageBroker::<SomeEvent>::with_diagnostics(diagnostics.clone(), &options);

    let publisher = EventPublisher {
        publisher: broker.clone(),
    };
    let first = Consumer::new("first", &broker)?;
    let second = Consumer::new("second", &broker)?;
    println!("Live subscriptions: {}", diagnostics.subscribe_count());

    for priority in [1, 7, 3] {
        let event = publisher.send(priority);
        println!("Published {event}");
    }

    drop(first);
    publisher.send(9);
    println!("Live subscriptions: {}", diagnostics.subscribe_count());
    drop(second);

    broker.dispose();
    publisher.send(0);
    println!("Published after dispose: ignored\n");

    println!("=== Keyed broker ===\n");

    let rooms = KeyedMessageBroker::<String, String>::new(&options);
    let lobby = rooms.subscribe_fn("lobby".to_string(), |text: &String| {
        println!("  [lobby] {text}");
    })?;
    let _garden = rooms.subscribe_fn("garden".to_string(), |text: &String| {
        println!("  [garden] {text}");
    })?;

    rooms.publish(&"lobby".to_string(), &"hello".to_string());
    rooms.publish_by("garden", &"bloom".to_string());
    rooms.publish_by("cellar", &"nobody hears this".to_string());

    lobby.dispose();
    println!("Rooms with listeners: {:?}", rooms.core().keys());

    logging.shutdown();
    Ok(())
}

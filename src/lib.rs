/// Broker options loading.
pub mod config;
/// Disposable tokens and their composition.
pub mod disposable;
/// Common error types: broker, configuration, logging.
pub mod error;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Pub/Sub: slot registry, keyless and keyed broker cores, facades.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use self::config::BrokerOptions;
/// Subscription tokens.
pub use disposable::{
    Disposable, DisposableBag, DisposableBagBuilder, DisposableExt, DisposeGuard,
    SingleAssignmentDisposable,
};
/// Operation errors and result types.
pub use error::{BrokerError, ConfigError, ErrorExt, LoggingError, PipeResult, StackError, StatusCode};
/// Logging setup.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{
    Diagnostics, DisposedPolicy, FreeList, HolderId, KeyedMessageBroker, KeyedMessageBrokerCore,
    KeyedPublisher, KeyedSubscriber, KeyedSubscriberExt, MessageBroker, MessageBrokerCore,
    MessageHandler, NoopDiagnostics, PredicateHandler, Publisher, Subscriber, SubscriberExt,
    SubscriptionDiagnostics, SubscriptionId,
};

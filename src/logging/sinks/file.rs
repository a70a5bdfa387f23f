use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{
    config::{FileSinkConfig, LoggingConfig},
    formatter,
};

/// Файловый слой с неблокирующей записью.
///
/// Пока жив возвращённый `WorkerGuard`, фоновый поток дописывает буфер в
/// файл; при его `Drop` остаток сбрасывается на диск.
pub fn layer_with_config<S>(
    config: &LoggingConfig,
    file: &FileSinkConfig,
) -> (Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let appender = rolling::never(&file.dir, &file.filename);
    let (writer, guard) = non_blocking(appender);
    let layer = formatter::build_formatter_from_config(config, writer, false);
    (layer, guard)
}

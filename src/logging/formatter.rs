use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{LogFormat, LoggingConfig};

/// Строит fmt-слой по конфигурации.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_formatter_from_config<S, W>(
    config: &LoggingConfig,
    writer: W,
    with_ansi: bool,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let format = fmt::format()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids);
    let layer = fmt::layer().with_writer(writer).with_ansi(with_ansi);

    match config.format {
        LogFormat::Json => Box::new(layer.event_format(format.json().with_current_span(true))),
        LogFormat::Pretty => Box::new(
            layer
                .event_format(format.pretty())
                .with_span_events(FmtSpan::CLOSE),
        ),
        LogFormat::Compact => Box::new(layer.event_format(format.compact())),
    }
}

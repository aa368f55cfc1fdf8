use braid_config::log::{LogFormat, LogOutput, LoggingConfig};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

fn writer(output: LogOutput) -> BoxMakeWriter {
    match output {
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
    }
}

/// Installs the global subscriber described by the `log` section of the configuration.
pub fn configure_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(config.filter_directive())?;
    let writer = writer(config.output);

    let layer = match config.format {
        LogFormat::PrettyTree => tracing_tree::HierarchicalLayer::new(2)
            .with_writer(writer)
            .with_bracketed_fields(true)
            .with_deferred_spans(false)
            .with_indent_lines(true)
            .with_timer(tracing_tree::time::Uptime::default())
            .with_targets(false)
            .boxed(),
        LogFormat::Json => fmt::Layer::<Registry>::default()
            .json()
            .with_writer(writer)
            .with_timer(UtcTime::rfc_3339())
            .with_span_events(FmtSpan::CLOSE)
            .boxed(),
        LogFormat::PrettyCompact => fmt::Layer::<Registry>::default()
            .compact()
            .with_writer(writer)
            .with_timer(UtcTime::rfc_3339())
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter.boxed())
        .try_init()?;
    Ok(())
}

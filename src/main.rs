//! metered-cat: copy stdin to stdout and report how many bytes moved.
//!
//! Reads are delivered through the detached recorder, writes synchronously.
//! Configuration comes from the `METERED_IO_*` environment variables and
//! log filtering from `RUST_LOG`.

use anyhow::Context;
use metered_io::config::{LogFormat, TelemetryConfig};
use metered_io::metrics::{
    DetachedRecorder, MeterContext, MetricRegistry, RecorderMeterProvider, Tracer,
};
use metered_io::stream::{Close, MeterProfile, MeteredStream};
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const COMPONENT: &str = "metered-cat";

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.compact().with_ansi(false).init(),
        LogFormat::Color => builder.with_ansi(true).init(),
    }
}

fn main() -> anyhow::Result<()> {
    let config = TelemetryConfig::from_env().context("invalid telemetry configuration")?;
    init_logging(config.log_format);

    tracing::info!(
        service = %config.service_name,
        metrics = config.enable_metric_collection,
        traces = config.enable_trace_collection,
        "starting"
    );

    let registry = Arc::new(MetricRegistry::from_config(
        Arc::new(RecorderMeterProvider),
        &config,
    ));
    let recorder = DetachedRecorder::spawn(registry.clone(), config.detached_queue_capacity)
        .context("failed to start metric recorder")?;
    let tracer = Tracer::from_config(&config);

    let ctx = MeterContext::background();
    let mut input = MeteredStream::upstream_pcm(ctx.clone(), recorder.clone(), COMPONENT, io::stdin());
    let mut output = MeteredStream::local(
        ctx,
        registry,
        COMPONENT,
        MeterProfile::new().with_write_metric("stdout.bytes.written"),
        io::stdout(),
    );

    let span = tracer.span("copy");
    let copied = span.in_scope(|| io::copy(&mut input, &mut output));
    output.close().context("failed to flush stdout")?;
    recorder.shutdown();

    let copied = copied.context("copy failed")?;
    tracing::info!(
        bytes = copied,
        read = input.count(),
        written = output.count(),
        delivered = recorder.delivered(),
        dropped = recorder.dropped(),
        "done"
    );

    Ok(())
}

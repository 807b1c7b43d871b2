//! Metrics and observability module
//!
//! Byte counting for individual streams plus a registry that lazily creates
//! one meter per component and one counter per metric name.
//!
//! Metric names emitted by the stream decorators:
//! - `http.server.bytes.read` / `http.server.bytes.written`
//! - `object_storage.bytes.read` / `object_storage.bytes.written`
//! - `upstream.pcm.bytes.read`

pub mod context;
pub mod counter;
pub mod detached;
pub mod error;
pub mod provider;
pub mod recorder;
pub mod registry;
pub mod tracer;

pub use context::MeterContext;
pub use counter::ByteCounter;
pub use detached::{ByteDelta, DetachedRecorder};
pub use error::{MetricsError, MetricsResult};
pub use metrics::Label;
pub use provider::{CounterInstrument, Meter, MeterProvider, NoopMeter};
pub use recorder::RecorderMeterProvider;
pub use registry::MetricRegistry;
pub use tracer::Tracer;

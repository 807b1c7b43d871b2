//! Byte-counting I/O decorators with lazily created metric instruments.
//!
//! Wrap a reader or writer in [`stream::MeteredStream`] and every byte that
//! passes through is counted locally and, when instrumented, reported to a
//! [`metrics::MetricRegistry`]. The registry creates one meter per component
//! and one counter per metric name on first use, even under concurrent first
//! use.
//!
//! ```no_run
//! use metered_io::metrics::{MeterContext, MetricRegistry, RecorderMeterProvider};
//! use metered_io::stream::MeteredStream;
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MetricRegistry::new(Arc::new(RecorderMeterProvider), true));
//! let mut body = MeteredStream::http_request_body(
//!     MeterContext::background(),
//!     registry,
//!     "gateway",
//!     &b"Hello, World!"[..],
//! );
//! let mut out = String::new();
//! body.read_to_string(&mut out).unwrap();
//! assert_eq!(body.count(), 13);
//! ```

pub mod config;
pub mod metrics;
pub mod storage;
pub mod stream;

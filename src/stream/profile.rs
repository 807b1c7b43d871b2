//! Per-variant instrumentation strategy: which metric names a stream
//! reports, with which attributes, and how delivery failures are handled.

use crate::metrics::{DetachedRecorder, Label, MetricRegistry};
use std::borrow::Cow;
use std::sync::Arc;

pub const HTTP_SERVER_BYTES_READ: &str = "http.server.bytes.read";
pub const HTTP_SERVER_BYTES_WRITTEN: &str = "http.server.bytes.written";
pub const OBJECT_STORAGE_BYTES_READ: &str = "object_storage.bytes.read";
pub const OBJECT_STORAGE_BYTES_WRITTEN: &str = "object_storage.bytes.written";
pub const UPSTREAM_PCM_BYTES_READ: &str = "upstream.pcm.bytes.read";

/// Attribute key carrying the storage bucket name
pub const BUCKET_ATTRIBUTE: &str = "bucket";

/// Metric names and attributes for one stream
#[derive(Debug, Clone, Default)]
pub struct MeterProfile {
    read_metric: Option<Cow<'static, str>>,
    write_metric: Option<Cow<'static, str>>,
    attributes: Vec<Label>,
}

impl MeterProfile {
    /// Profile reporting nothing
    pub fn new() -> Self {
        Self::default()
    }

    pub fn http_server() -> Self {
        Self::new()
            .with_read_metric(HTTP_SERVER_BYTES_READ)
            .with_write_metric(HTTP_SERVER_BYTES_WRITTEN)
    }

    pub fn object_storage(bucket: impl Into<String>) -> Self {
        Self::new()
            .with_read_metric(OBJECT_STORAGE_BYTES_READ)
            .with_write_metric(OBJECT_STORAGE_BYTES_WRITTEN)
            .with_attribute(BUCKET_ATTRIBUTE, bucket.into())
    }

    pub fn upstream_pcm() -> Self {
        Self::new().with_read_metric(UPSTREAM_PCM_BYTES_READ)
    }

    pub fn with_read_metric(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.read_metric = Some(name.into());
        self
    }

    pub fn with_write_metric(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.write_metric = Some(name.into());
        self
    }

    pub fn with_attribute(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push(Label::new(key, value.into()));
        self
    }

    pub fn read_metric(&self) -> Option<&str> {
        self.read_metric.as_deref()
    }

    pub fn write_metric(&self) -> Option<&str> {
        self.write_metric.as_deref()
    }

    pub fn attributes(&self) -> &[Label] {
        &self.attributes
    }
}

/// How a stream hands byte deltas to the registry
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Record synchronously, surfacing instrument errors to the caller
    Propagate(Arc<MetricRegistry>),

    /// Record synchronously, discarding instrument errors
    BestEffort(Arc<MetricRegistry>),

    /// Queue for the background worker; unordered and may be dropped
    Detached(DetachedRecorder),
}

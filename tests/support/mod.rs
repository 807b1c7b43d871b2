//! Shared fakes for integration tests
//!
//! - `RecordingProvider`: meter provider that counts instrument creation and
//!   keeps per-(component, metric) totals
//! - `MemoryStore`: in-memory object store that counts range requests
//! - `ResponseRecorder`: response writer that keeps status, headers, body

#![allow(dead_code)]

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use metered_io::metrics::{
    CounterInstrument, Label, Meter, MeterProvider, MetricRegistry, MetricsError, MetricsResult,
};
use metered_io::storage::{ObjectHandle, ObjectStore};
use metered_io::stream::{Close, ResponseWriter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct Recorded {
    pub meters_created: AtomicUsize,
    pub counters_created: AtomicUsize,
    totals: Mutex<HashMap<(String, String), u64>>,
    labels: Mutex<HashMap<(String, String), Vec<(String, String)>>>,
}

impl Recorded {
    /// Total recorded for `metric` of `component`, zero if never recorded
    pub fn total(&self, component: &str, metric: &str) -> u64 {
        self.totals
            .lock()
            .get(&(component.to_string(), metric.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Labels seen on the last add for `metric` of `component`
    pub fn labels(&self, component: &str, metric: &str) -> Vec<(String, String)> {
        self.labels
            .lock()
            .get(&(component.to_string(), metric.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn meters(&self) -> usize {
        self.meters_created.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> usize {
        self.counters_created.load(Ordering::SeqCst)
    }
}

pub struct RecordingProvider {
    recorded: Arc<Recorded>,
    reject: Option<String>,
}

struct RecordingMeter {
    component: String,
    recorded: Arc<Recorded>,
    reject: Option<String>,
}

struct RecordingCounter {
    key: (String, String),
    recorded: Arc<Recorded>,
}

impl MeterProvider for RecordingProvider {
    fn meter(&self, component: &str) -> Arc<dyn Meter> {
        self.recorded.meters_created.fetch_add(1, Ordering::SeqCst);
        std::thread::yield_now();
        Arc::new(RecordingMeter {
            component: component.to_string(),
            recorded: self.recorded.clone(),
            reject: self.reject.clone(),
        })
    }
}

impl Meter for RecordingMeter {
    fn u64_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterInstrument>> {
        if self.reject.as_deref() == Some(name) {
            return Err(MetricsError::InstrumentCreation {
                name: name.to_string(),
                reason: "rejected by test provider".to_string(),
            });
        }
        self.recorded.counters_created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(RecordingCounter {
            key: (self.component.clone(), name.to_string()),
            recorded: self.recorded.clone(),
        }))
    }
}

impl CounterInstrument for RecordingCounter {
    fn add(&self, value: u64, attributes: &[Label]) {
        *self.recorded.totals.lock().entry(self.key.clone()).or_default() += value;
        self.recorded.labels.lock().insert(
            self.key.clone(),
            attributes
                .iter()
                .map(|l| (l.key().to_string(), l.value().to_string()))
                .collect(),
        );
    }
}

/// Enabled registry over a recording provider
pub fn registry() -> (Arc<MetricRegistry>, Arc<Recorded>) {
    registry_with(true, None)
}

/// Registry whose provider fails to create the counter `reject`
pub fn rejecting_registry(reject: &str) -> (Arc<MetricRegistry>, Arc<Recorded>) {
    registry_with(true, Some(reject.to_string()))
}

pub fn registry_with(enabled: bool, reject: Option<String>) -> (Arc<MetricRegistry>, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let provider = RecordingProvider {
        recorded: recorded.clone(),
        reject,
    };
    (Arc::new(MetricRegistry::new(Arc::new(provider), enabled)), recorded)
}

type Objects = Arc<Mutex<HashMap<(String, String), Bytes>>>;

#[derive(Default, Clone)]
pub struct MemoryStore {
    objects: Objects,
    range_requests: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn put(&self, bucket: &str, path: &str, data: impl Into<Bytes>) {
        self.objects
            .lock()
            .insert((bucket.to_string(), path.to_string()), data.into());
    }

    pub fn get(&self, bucket: &str, path: &str) -> Option<Bytes> {
        self.objects
            .lock()
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }
}

pub struct MemoryHandle {
    bucket: String,
    name: String,
    data: Option<Bytes>,
    range_requests: Arc<AtomicUsize>,
}

impl ObjectHandle for MemoryHandle {
    type Reader = Cursor<Bytes>;

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> Option<u64> {
        self.data.as_ref().map(|d| d.len() as u64)
    }

    fn new_reader(&self) -> io::Result<Self::Reader> {
        self.data
            .clone()
            .map(Cursor::new)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such object"))
    }

    fn new_range_reader(&self, offset: u64, length: u64) -> io::Result<Self::Reader> {
        self.range_requests.fetch_add(1, Ordering::SeqCst);
        let data = self.new_reader()?.into_inner();
        let start = (offset as usize).min(data.len());
        let end = (start + length as usize).min(data.len());
        Ok(Cursor::new(data.slice(start..end)))
    }
}

pub struct MemoryWriter {
    key: (String, String),
    buf: Vec<u8>,
    objects: Objects,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Close for MemoryWriter {
    fn close(&mut self) -> io::Result<()> {
        let data = Bytes::from(std::mem::take(&mut self.buf));
        self.objects.lock().insert(self.key.clone(), data);
        Ok(())
    }
}

impl ObjectStore for MemoryStore {
    type Handle = MemoryHandle;
    type Writer = MemoryWriter;

    fn object(&self, bucket: &str, path: &str) -> Self::Handle {
        MemoryHandle {
            bucket: bucket.to_string(),
            name: path.to_string(),
            data: self.get(bucket, path),
            range_requests: self.range_requests.clone(),
        }
    }

    fn new_writer(&self, bucket: &str, path: &str) -> io::Result<Self::Writer> {
        Ok(MemoryWriter {
            key: (bucket.to_string(), path.to_string()),
            buf: Vec::new(),
            objects: self.objects.clone(),
        })
    }
}

#[derive(Default)]
pub struct ResponseRecorder {
    pub headers: HeaderMap,
    pub status: Option<StatusCode>,
    pub body: Vec<u8>,
}

impl Write for ResponseRecorder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
    }
}

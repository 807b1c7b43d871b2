//! HTTP response writer decorator
//!
//! Counts response body bytes as `http.server.bytes.written`, remembers the
//! status code and the time the response started, and forwards header
//! access and connection hijacking to the wrapped writer.

use crate::metrics::{ByteCounter, MeterContext, MetricRegistry};
use crate::stream::capability::Close;
use crate::stream::error::{StreamError, StreamResult};
use crate::stream::metered::MeteredStream;
use crate::stream::profile::MeterProfile;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Raw connection taken over from an HTTP server
pub trait Connection: Read + Write + Send {}

impl<T: Read + Write + Send> Connection for T {}

/// A hijacked connection plus any bytes the server had already buffered
/// from the client
pub struct Hijacked {
    pub conn: Box<dyn Connection>,
    pub buffered: Bytes,
}

impl std::fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hijacked")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

/// Server-side response writer
pub trait ResponseWriter: Write {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Take over the underlying connection. Writers that cannot do this
    /// keep the default.
    fn hijack(&mut self) -> StreamResult<Hijacked> {
        Err(StreamError::HijackUnsupported)
    }
}

/// Metered response writer
#[derive(Debug)]
pub struct HttpResponseMeter<W> {
    stream: MeteredStream<W>,
    status: Option<StatusCode>,
    started: DateTime<Utc>,
    started_at: Instant,
}

impl<W: ResponseWriter> HttpResponseMeter<W> {
    pub fn new(
        ctx: MeterContext,
        registry: Arc<MetricRegistry>,
        component: impl Into<Arc<str>>,
        writer: W,
    ) -> Self {
        Self {
            stream: MeteredStream::local(
                ctx,
                registry,
                component,
                MeterProfile::http_server(),
                writer,
            ),
            status: None,
            started: Utc::now(),
            started_at: Instant::now(),
        }
    }

    /// Status passed to [`write_header`](ResponseWriter::write_header), if
    /// it was called
    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    /// Wall-clock time the wrapper was created
    pub fn started(&self) -> DateTime<Utc> {
        self.started
    }

    /// Time since the wrapper was created
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Response body bytes written so far
    pub fn count(&self) -> u64 {
        self.stream.count()
    }

    pub fn counter(&self) -> Arc<ByteCounter> {
        self.stream.counter()
    }

    pub fn get_ref(&self) -> &W {
        self.stream.get_ref()
    }

    /// Unwrap the original writer
    pub fn into_inner(self) -> W {
        self.stream.into_inner()
    }
}

impl<W: ResponseWriter> Write for HttpResponseMeter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl<W: ResponseWriter> ResponseWriter for HttpResponseMeter<W> {
    fn headers(&self) -> &HeaderMap {
        self.stream.get_ref().headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.stream.get_mut().headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = Some(status);
        self.stream.get_mut().write_header(status);
    }

    fn hijack(&mut self) -> StreamResult<Hijacked> {
        self.stream.get_mut().hijack()
    }
}

impl<W: ResponseWriter + Close> Close for HttpResponseMeter<W> {
    fn close(&mut self) -> io::Result<()> {
        self.stream.close()
    }
}

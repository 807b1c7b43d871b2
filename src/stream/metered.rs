//! Generic byte-counting decorator
//!
//! [`MeteredStream`] wraps any reader or writer, sync or tokio, and after
//! every successful transfer adds the byte count to its [`ByteCounter`] and
//! hands a delta to the metric registry according to its [`Delivery`].
//! Errors from the wrapped stream are returned untouched.

use crate::metrics::{ByteCounter, ByteDelta, DetachedRecorder, MeterContext, MetricRegistry, MetricsResult};
use crate::stream::capability::{Close, ObjectSize, RangeRead};
use crate::stream::error::StreamError;
use crate::stream::profile::{Delivery, MeterProfile};
use std::borrow::Cow;
use std::io::{self, Read, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

/// Metric binding of an instrumented stream
#[derive(Debug, Clone)]
struct Instrumentation {
    ctx: MeterContext,
    component: Arc<str>,
    profile: MeterProfile,
    delivery: Delivery,
}

impl Instrumentation {
    fn record(&self, direction: Direction, n: usize) -> MetricsResult<()> {
        let metric = match direction {
            Direction::Read => self.profile.read_metric(),
            Direction::Write => self.profile.write_metric(),
        };
        let Some(metric) = metric else {
            return Ok(());
        };

        match &self.delivery {
            Delivery::Propagate(registry) => registry.add_count(
                &self.ctx,
                &self.component,
                metric,
                n as u64,
                self.profile.attributes(),
            ),
            Delivery::BestEffort(registry) => {
                registry.add_count_or_ignore(
                    &self.ctx,
                    &self.component,
                    metric,
                    n as u64,
                    self.profile.attributes(),
                );
                Ok(())
            }
            Delivery::Detached(recorder) => {
                recorder.submit(ByteDelta {
                    ctx: self.ctx.clone(),
                    component: self.component.clone(),
                    metric: Cow::Owned(metric.to_string()),
                    value: n as u64,
                    attributes: self.profile.attributes().to_vec(),
                });
                Ok(())
            }
        }
    }
}

/// Byte-counting decorator over a stream `S`
#[derive(Debug)]
pub struct MeteredStream<S> {
    inner: S,
    counter: Arc<ByteCounter>,
    instrumentation: Option<Instrumentation>,
}

impl<S> MeteredStream<S> {
    /// Count bytes without reporting metrics
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            counter: Arc::new(ByteCounter::new()),
            instrumentation: None,
        }
    }

    /// Count bytes and report them for `component` as described by `profile`
    pub fn instrumented(
        inner: S,
        ctx: MeterContext,
        component: impl Into<Arc<str>>,
        profile: MeterProfile,
        delivery: Delivery,
    ) -> Self {
        Self {
            inner,
            counter: Arc::new(ByteCounter::new()),
            instrumentation: Some(Instrumentation {
                ctx,
                component: component.into(),
                profile,
                delivery,
            }),
        }
    }

    /// Local stream with custom metric names, recorded synchronously
    pub fn local(
        ctx: MeterContext,
        registry: Arc<MetricRegistry>,
        component: impl Into<Arc<str>>,
        profile: MeterProfile,
        inner: S,
    ) -> Self {
        Self::instrumented(inner, ctx, component, profile, Delivery::Propagate(registry))
    }

    /// HTTP request body, reported as `http.server.bytes.read`
    pub fn http_request_body(
        ctx: MeterContext,
        registry: Arc<MetricRegistry>,
        component: impl Into<Arc<str>>,
        inner: S,
    ) -> Self {
        Self::instrumented(
            inner,
            ctx,
            component,
            MeterProfile::http_server(),
            Delivery::Propagate(registry),
        )
    }

    /// Object upload, reported as `object_storage.bytes.written` tagged with
    /// the bucket
    pub fn object_storage_writer(
        ctx: MeterContext,
        registry: Arc<MetricRegistry>,
        component: impl Into<Arc<str>>,
        bucket: impl Into<String>,
        inner: S,
    ) -> Self {
        Self::instrumented(
            inner,
            ctx,
            component,
            MeterProfile::object_storage(bucket),
            Delivery::Propagate(registry),
        )
    }

    /// Upstream PCM feed, reported as `upstream.pcm.bytes.read` without
    /// waiting for delivery
    pub fn upstream_pcm(
        ctx: MeterContext,
        recorder: DetachedRecorder,
        component: impl Into<Arc<str>>,
        inner: S,
    ) -> Self {
        Self::instrumented(
            inner,
            ctx,
            component,
            MeterProfile::upstream_pcm(),
            Delivery::Detached(recorder),
        )
    }

    /// Bytes transferred so far
    pub fn count(&self) -> u64 {
        self.counter.count()
    }

    /// Shared handle to the byte counter, usable from other threads and
    /// after the stream is closed or dropped
    pub fn counter(&self) -> Arc<ByteCounter> {
        self.counter.clone()
    }

    pub fn component(&self) -> Option<&str> {
        self.instrumentation.as_ref().map(|i| &*i.component)
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Account for `n` bytes moved by a call that offered `requested`.
    /// Returns `n` unless synchronous metric delivery failed.
    fn settle(&self, direction: Direction, n: usize, requested: usize) -> io::Result<usize> {
        if n > requested {
            tracing::warn!(
                ?direction,
                n,
                requested,
                "wrapped stream reported more bytes than the buffer holds; not counted"
            );
            return Ok(n);
        }

        self.counter.add_bytes(n);

        if let Some(instrumentation) = &self.instrumentation {
            if let Err(source) = instrumentation.record(direction, n) {
                return Err(StreamError::Instrument {
                    transferred: n,
                    source,
                }
                .into());
            }
        }

        Ok(n)
    }
}

impl<S: Read> Read for MeteredStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.settle(Direction::Read, n, buf.len())
    }
}

impl<S: Write> Write for MeteredStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.settle(Direction::Write, n, buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: RangeRead> RangeRead for MeteredStream<S> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let n = self.inner.read_at(buf, offset)?;
        self.settle(Direction::Read, n, buf.len())
    }
}

impl<S: Close> Close for MeteredStream<S> {
    /// Closes the wrapped stream. The counter is left as is.
    fn close(&mut self) -> io::Result<()> {
        self.inner.close()
    }
}

impl<S: ObjectSize> ObjectSize for MeteredStream<S> {
    fn size(&self) -> Option<u64> {
        self.inner.size()
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MeteredStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let requested = buf.remaining();

        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;

        let n = buf.filled().len() - before;
        Poll::Ready(this.settle(Direction::Read, n, requested).map(|_| ()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MeteredStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let n = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        Poll::Ready(this.settle(Direction::Write, n, buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

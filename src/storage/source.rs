//! Object body with random access
//!
//! In seekable mode the whole object is pulled into memory when the source
//! is built and every read, sequential or positional, is served from that
//! buffer. Otherwise sequential reads stream from the client and each
//! positional read issues its own range request.
//!
//! Closing the source closes the reader it was built from and returns that
//! reader's error. A closed source refuses every read, positional ones
//! included.

use crate::metrics::{MeterContext, MetricRegistry};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::ObjectHandle;
use crate::stream::capability::read_slice_at;
use crate::stream::{Close, Delivery, MeterProfile, MeteredStream, ObjectSize, RangeRead};
use bytes::Bytes;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// Metered object reader
pub type ObjectStorageReader<H> = MeteredStream<ObjectSource<H>>;

enum Body<R> {
    Streaming(R),
    /// The drained reader stays open until the source is closed
    Buffered { reader: R, cursor: Cursor<Bytes> },
    Closed,
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "object reader is closed")
}

pub struct ObjectSource<H: ObjectHandle> {
    handle: H,
    body: Body<H::Reader>,
    seekable: bool,
}

impl<H: ObjectHandle> ObjectSource<H> {
    /// Stream `reader`; positional reads go to the network
    pub fn streaming(handle: H, reader: H::Reader) -> Self {
        Self {
            handle,
            body: Body::Streaming(reader),
            seekable: false,
        }
    }

    /// Drain `reader` into memory now and serve all reads from it
    pub fn buffered(handle: H, mut reader: H::Reader) -> StorageResult<Self> {
        let hint = handle
            .size()
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(0);
        let mut data = Vec::with_capacity(hint);
        reader
            .read_to_end(&mut data)
            .map_err(StorageError::DownloadFailure)?;

        tracing::debug!(
            bucket = handle.bucket(),
            object = handle.name(),
            bytes = data.len(),
            "object buffered for random access"
        );

        Ok(Self {
            handle,
            body: Body::Buffered {
                reader,
                cursor: Cursor::new(Bytes::from(data)),
            },
            seekable: true,
        })
    }

    /// Open the object through its handle
    pub fn open(handle: H, seekable: bool) -> StorageResult<Self> {
        let reader = handle.new_reader().map_err(StorageError::DownloadFailure)?;
        if seekable {
            Self::buffered(handle, reader)
        } else {
            Ok(Self::streaming(handle, reader))
        }
    }

    pub fn is_seekable(&self) -> bool {
        self.seekable
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    fn range_read(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut reader = self.handle.new_range_reader(offset, buf.len() as u64)?;

        let mut filled = 0;
        while filled < buf.len() {
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        if let Err(err) = reader.close() {
            tracing::warn!(offset, error = %err, "failed to close range reader");
        }
        Ok(filled)
    }
}

impl<H: ObjectHandle> Read for ObjectSource<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::Streaming(reader) => reader.read(buf),
            Body::Buffered { cursor, .. } => cursor.read(buf),
            Body::Closed => Err(closed_error()),
        }
    }
}

impl<H: ObjectHandle> RangeRead for ObjectSource<H> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        match &self.body {
            Body::Buffered { cursor, .. } => Ok(read_slice_at(cursor.get_ref(), buf, offset)),
            Body::Streaming(_) => self.range_read(buf, offset),
            Body::Closed => Err(closed_error()),
        }
    }
}

impl<H: ObjectHandle> ObjectSize for ObjectSource<H> {
    fn size(&self) -> Option<u64> {
        match &self.body {
            Body::Buffered { cursor, .. } => Some(cursor.get_ref().len() as u64),
            _ => self.handle.size(),
        }
    }
}

impl<H: ObjectHandle> Close for ObjectSource<H> {
    /// Closes the underlying reader and releases the buffer. Closing twice
    /// is a no-op.
    fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.body, Body::Closed) {
            Body::Streaming(mut reader) | Body::Buffered { mut reader, .. } => reader.close(),
            Body::Closed => Ok(()),
        }
    }
}

impl<H: ObjectHandle> std::fmt::Debug for ObjectSource<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.body {
            Body::Streaming(_) => "streaming",
            Body::Buffered { .. } => "buffered",
            Body::Closed => "closed",
        };
        f.debug_struct("ObjectSource")
            .field("bucket", &self.handle.bucket())
            .field("object", &self.handle.name())
            .field("state", &state)
            .finish()
    }
}

/// Wrap an object body so that sequential and positional reads report
/// `object_storage.bytes.read` tagged with the bucket.
///
/// With `seekable` the object is buffered before this returns.
pub fn object_storage_reader<H: ObjectHandle>(
    ctx: MeterContext,
    registry: Arc<MetricRegistry>,
    component: impl Into<Arc<str>>,
    handle: H,
    reader: H::Reader,
    seekable: bool,
) -> StorageResult<ObjectStorageReader<H>> {
    let bucket = handle.bucket().to_string();
    let source = if seekable {
        ObjectSource::buffered(handle, reader)?
    } else {
        ObjectSource::streaming(handle, reader)
    };

    Ok(MeteredStream::instrumented(
        source,
        ctx,
        component,
        MeterProfile::object_storage(bucket),
        Delivery::Propagate(registry),
    ))
}

//! Upload and download helpers with byte accounting

use crate::metrics::{MeterContext, MetricRegistry, Tracer};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::source::{object_storage_reader, ObjectStorageReader};
use crate::storage::types::{ObjectHandle, ObjectStore};
use crate::stream::{Close, MeteredStream};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::Instrument as _;

/// Metered object writer
pub type ObjectStorageWriter<W> = MeteredStream<W>;

/// Object storage client wrapper that meters every transfer
pub struct ObjectStorage<S> {
    store: S,
    registry: Arc<MetricRegistry>,
    tracer: Tracer,
}

impl<S: ObjectStore> ObjectStorage<S> {
    pub fn new(store: S, registry: Arc<MetricRegistry>, tracer: Tracer) -> Self {
        Self {
            store,
            registry,
            tracer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Open a metered writer for `bucket/path`. The object is committed when
    /// the writer is closed.
    pub fn upload_writer(
        &self,
        ctx: &MeterContext,
        component: &str,
        bucket: &str,
        path: &str,
    ) -> StorageResult<ObjectStorageWriter<S::Writer>> {
        let writer = self
            .store
            .new_writer(bucket, path)
            .map_err(StorageError::UploadFailure)?;

        Ok(MeteredStream::object_storage_writer(
            ctx.clone(),
            self.registry.clone(),
            component,
            bucket,
            writer,
        ))
    }

    /// Copy `reader` into `bucket/path` and commit it. Returns the number of
    /// bytes uploaded.
    pub fn upload<R: Read>(
        &self,
        ctx: &MeterContext,
        component: &str,
        bucket: &str,
        path: &str,
        mut reader: R,
    ) -> StorageResult<u64> {
        let span = self.tracer.span("object_storage.upload");
        let _enter = span.enter();

        let result = self
            .upload_writer(ctx, component, bucket, path)
            .and_then(|mut writer| {
                io::copy(&mut reader, &mut writer).map_err(StorageError::UploadFailure)?;
                writer.close().map_err(StorageError::UploadFailure)?;
                Ok(writer.count())
            });

        match &result {
            Ok(bytes) => tracing::debug!(bucket, path, bytes, "object uploaded"),
            Err(err) => Tracer::record_error(&span, "upload failed", err),
        }
        result
    }

    /// Open a metered reader for `bucket/path`.
    ///
    /// With `seekable` the whole object is fetched before this returns and
    /// positional reads are served from memory.
    pub fn download_reader(
        &self,
        ctx: &MeterContext,
        component: &str,
        bucket: &str,
        path: &str,
        seekable: bool,
    ) -> StorageResult<ObjectStorageReader<S::Handle>> {
        let handle = self.store.object(bucket, path);
        let reader = handle.new_reader().map_err(StorageError::DownloadFailure)?;

        object_storage_reader(
            ctx.clone(),
            self.registry.clone(),
            component,
            handle,
            reader,
            seekable,
        )
    }

    /// Copy `bucket/path` into `writer`. Returns the number of bytes
    /// downloaded.
    pub fn download<W: Write>(
        &self,
        ctx: &MeterContext,
        component: &str,
        bucket: &str,
        path: &str,
        mut writer: W,
    ) -> StorageResult<u64> {
        let span = self.tracer.span("object_storage.download");
        let _enter = span.enter();

        let result = self
            .download_reader(ctx, component, bucket, path, false)
            .and_then(|mut reader| {
                let copied = io::copy(&mut reader, &mut writer);
                if let Err(err) = reader.close() {
                    tracing::warn!(bucket, path, error = %err, "failed to close object reader");
                }
                copied.map_err(StorageError::DownloadFailure)
            });

        match &result {
            Ok(bytes) => tracing::debug!(bucket, path, bytes, "object downloaded"),
            Err(err) => Tracer::record_error(&span, "download failed", err),
        }
        result
    }

    /// Run [`upload`](Self::upload) on the blocking pool
    pub async fn upload_blocking<R>(
        self: Arc<Self>,
        ctx: MeterContext,
        component: String,
        bucket: String,
        path: String,
        reader: R,
    ) -> StorageResult<u64>
    where
        S: 'static,
        R: Read + Send + 'static,
    {
        let span = tracing::debug_span!("upload_blocking", bucket = %bucket, path = %path);
        tokio::task::spawn_blocking(move || self.upload(&ctx, &component, &bucket, &path, reader))
            .instrument(span)
            .await
            .map_err(|err| StorageError::UploadFailure(io::Error::new(io::ErrorKind::Other, err)))?
    }
}

impl<S> std::fmt::Debug for ObjectStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("registry", &self.registry)
            .field("tracer", &self.tracer)
            .finish_non_exhaustive()
    }
}

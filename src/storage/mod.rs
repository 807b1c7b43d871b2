//! Metered object storage
//!
//! Wraps an object storage client so uploads report
//! `object_storage.bytes.written` and downloads report
//! `object_storage.bytes.read`, both tagged with the bucket name.

pub mod client;
pub mod error;
pub mod source;
pub mod types;

pub use client::{ObjectStorage, ObjectStorageWriter};
pub use error::{StorageError, StorageResult};
pub use source::{object_storage_reader, ObjectSource, ObjectStorageReader};
pub use types::{ObjectHandle, ObjectStore};

//! Collaborator interfaces implemented by an object storage client

use crate::stream::Close;
use std::io::{self, Read, Write};

/// Handle to one object in a bucket
pub trait ObjectHandle: Send + Sync {
    /// Object body. Closed when the wrapping source is closed.
    type Reader: Read + Close + Send;

    fn bucket(&self) -> &str;

    fn name(&self) -> &str;

    /// Object size in bytes, when the client knows it
    fn size(&self) -> Option<u64>;

    /// Reader over the whole object
    fn new_reader(&self) -> io::Result<Self::Reader>;

    /// Reader over `[offset, offset + length)`
    fn new_range_reader(&self, offset: u64, length: u64) -> io::Result<Self::Reader>;
}

/// Object storage client
pub trait ObjectStore: Send + Sync {
    type Handle: ObjectHandle;

    /// Writer that commits the object on [`Close::close`]
    type Writer: Write + Close + Send;

    fn object(&self, bucket: &str, path: &str) -> Self::Handle;

    fn new_writer(&self, bucket: &str, path: &str) -> io::Result<Self::Writer>;
}

//! Instrumented stream decorators
//!
//! One generic decorator, [`MeteredStream`], covers local, HTTP request
//! body, object storage and upstream streams; a [`MeterProfile`] picks the
//! metric names and attributes and a [`Delivery`] picks how deltas reach the
//! registry. [`HttpResponseMeter`] adds response-writer capabilities on top.

pub mod capability;
pub mod error;
pub mod http;
pub mod metered;
pub mod profile;

pub use capability::{close_all, Close, ObjectSize, RangeRead};
pub use error::{StreamError, StreamResult};
pub use http::{Connection, Hijacked, HttpResponseMeter, ResponseWriter};
pub use metered::MeteredStream;
pub use profile::{
    Delivery, MeterProfile, BUCKET_ATTRIBUTE, HTTP_SERVER_BYTES_READ, HTTP_SERVER_BYTES_WRITTEN,
    OBJECT_STORAGE_BYTES_READ, OBJECT_STORAGE_BYTES_WRITTEN, UPSTREAM_PCM_BYTES_READ,
};

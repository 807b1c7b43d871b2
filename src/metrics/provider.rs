//! Seams between the registry and the telemetry backend.
//!
//! A [`MeterProvider`] hands out one [`Meter`] per component, and a meter
//! creates named [`CounterInstrument`]s. The registry caches both, so
//! implementations do not need to deduplicate.

use crate::metrics::error::{MetricsError, MetricsResult};
use metrics::Label;
use std::sync::Arc;

/// Longest accepted instrument name, in bytes
pub const MAX_INSTRUMENT_NAME_LEN: usize = 255;

/// Factory of per-component meters
pub trait MeterProvider: Send + Sync {
    fn meter(&self, component: &str) -> Arc<dyn Meter>;
}

/// Named factory of counter instruments
pub trait Meter: Send + Sync {
    fn u64_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterInstrument>>;
}

/// Monotonic accumulator registered with the backend
pub trait CounterInstrument: Send + Sync {
    fn add(&self, value: u64, attributes: &[Label]);
}

/// Meter used when collection is disabled. Never allocates instruments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn u64_counter(&self, _name: &str) -> MetricsResult<Arc<dyn CounterInstrument>> {
        Ok(Arc::new(NoopCounter))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCounter;

impl CounterInstrument for NoopCounter {
    fn add(&self, _value: u64, _attributes: &[Label]) {}
}

/// Check an instrument name: leading ASCII letter, then ASCII alphanumerics
/// or `_ . - /`, at most [`MAX_INSTRUMENT_NAME_LEN`] bytes.
pub fn validate_instrument_name(name: &str) -> MetricsResult<()> {
    let fail = |reason: &str| MetricsError::InstrumentCreation {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(fail("name is empty")),
        Some(c) if !c.is_ascii_alphabetic() => {
            return Err(fail("name must start with an ASCII letter"))
        }
        Some(_) => {}
    }

    if name.len() > MAX_INSTRUMENT_NAME_LEN {
        return Err(fail("name exceeds 255 bytes"));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))) {
        return Err(fail(&format!("invalid character {bad:?}")));
    }

    Ok(())
}

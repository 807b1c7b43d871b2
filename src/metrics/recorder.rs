//! Meter provider backed by the `metrics` facade
//!
//! Counters are emitted through whatever recorder the process installed.
//! With no recorder installed every call is a cheap no-op.

use crate::metrics::error::MetricsResult;
use crate::metrics::provider::{validate_instrument_name, CounterInstrument, Meter, MeterProvider};
use metrics::{counter, describe_counter, Label, Unit};
use std::sync::Arc;

/// Label carrying the owning component on every counter
pub const COMPONENT_LABEL: &str = "component";

/// Provider that records through `metrics::counter!`
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderMeterProvider;

impl RecorderMeterProvider {
    pub fn new() -> Self {
        Self
    }
}

impl MeterProvider for RecorderMeterProvider {
    fn meter(&self, component: &str) -> Arc<dyn Meter> {
        Arc::new(RecorderMeter {
            component: Arc::from(component),
        })
    }
}

struct RecorderMeter {
    component: Arc<str>,
}

impl Meter for RecorderMeter {
    fn u64_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterInstrument>> {
        validate_instrument_name(name)?;

        describe_counter!(
            name.to_string(),
            Unit::Bytes,
            format!("Bytes transferred, reported by {}", self.component)
        );

        Ok(Arc::new(RecorderCounter {
            name: name.to_string(),
            component: self.component.clone(),
        }))
    }
}

struct RecorderCounter {
    name: String,
    component: Arc<str>,
}

impl CounterInstrument for RecorderCounter {
    fn add(&self, value: u64, attributes: &[Label]) {
        let mut labels = Vec::with_capacity(attributes.len() + 1);
        labels.push(Label::new(COMPONENT_LABEL, self.component.to_string()));
        labels.extend_from_slice(attributes);

        counter!(self.name.clone(), labels).increment(value);
    }
}

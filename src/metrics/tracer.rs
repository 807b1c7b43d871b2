//! Span helpers honouring the trace-collection switch.

use crate::config::TelemetryConfig;
use std::fmt::Display;
use tracing::Span;

#[derive(Debug, Clone)]
pub struct Tracer {
    service: String,
    enabled: bool,
}

impl Tracer {
    pub fn new(service: impl Into<String>, enabled: bool) -> Self {
        Self {
            service: service.into(),
            enabled,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.service_name.clone(), config.enable_trace_collection)
    }

    /// Tracer whose spans are all disabled
    pub fn disabled() -> Self {
        Self::new("", false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open a span for `operation`, or a disabled span when tracing is off
    pub fn span(&self, operation: &'static str) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "metered_io",
            service = %self.service,
            operation,
            error = tracing::field::Empty
        )
    }

    /// Mark `span` as failed
    pub fn record_error(span: &Span, description: &str, err: &dyn Display) {
        span.record("error", tracing::field::display(err));
        span.in_scope(|| tracing::error!(error = %err, "{description}"));
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}

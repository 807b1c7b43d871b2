//! Lazily populated cache of meters and counter instruments
//!
//! Lookups take the lock-free read path first; only a miss takes the shard
//! write lock through `entry`, and the instrument is created while that lock
//! is held. Two racing first-time callers therefore see one creation, and
//! the loser reuses the winner's instance. No lock is held while a counter
//! is incremented.

use crate::config::TelemetryConfig;
use crate::metrics::context::MeterContext;
use crate::metrics::error::MetricsResult;
use crate::metrics::provider::{CounterInstrument, Meter, MeterProvider, NoopMeter};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics::Label;
use std::borrow::Cow;
use std::sync::Arc;

struct ComponentMeter {
    meter: Arc<dyn Meter>,
    counters: DashMap<String, Arc<dyn CounterInstrument>>,
}

/// Registry of per-component meters and their counters
///
/// Counter instruments are keyed by `(component, metric name)`: each
/// component's meter owns its own counter for a given name, so two
/// components reporting `http.server.bytes.read` hold two instruments, each
/// created exactly once. Use [`counter_count`](Self::counter_count) to see
/// how many exist.
pub struct MetricRegistry {
    provider: Arc<dyn MeterProvider>,
    enabled: bool,
    meters: DashMap<String, Arc<ComponentMeter>>,
}

impl MetricRegistry {
    /// Create a registry over `provider`. With `enabled == false` the
    /// provider is never called.
    pub fn new(provider: Arc<dyn MeterProvider>, enabled: bool) -> Self {
        Self {
            provider,
            enabled,
            meters: DashMap::new(),
        }
    }

    pub fn from_config(provider: Arc<dyn MeterProvider>, config: &TelemetryConfig) -> Self {
        Self::new(provider, config.enable_metric_collection)
    }

    /// Registry that records nothing
    pub fn disabled() -> Self {
        Self::new(Arc::new(crate::metrics::RecorderMeterProvider), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Meter for `component`, created on first request
    pub fn meter(&self, component: &str) -> Arc<dyn Meter> {
        if !self.enabled {
            return Arc::new(NoopMeter);
        }
        self.component(component).meter.clone()
    }

    fn component(&self, component: &str) -> Arc<ComponentMeter> {
        if let Some(existing) = self.meters.get(component) {
            return existing.value().clone();
        }

        self.meters
            .entry(component.to_string())
            .or_insert_with(|| {
                tracing::debug!(component, "creating meter");
                Arc::new(ComponentMeter {
                    meter: self.provider.meter(component),
                    counters: DashMap::new(),
                })
            })
            .value()
            .clone()
    }

    fn counter(&self, component: &str, name: &str) -> MetricsResult<Arc<dyn CounterInstrument>> {
        let meter = self.component(component);

        if let Some(existing) = meter.counters.get(name) {
            return Ok(existing.value().clone());
        }

        let counter = match meter.counters.entry(name.to_string()) {
            Entry::Occupied(occupied) => occupied.get().clone(),
            Entry::Vacant(vacant) => {
                tracing::debug!(component, name, "creating counter instrument");
                let counter = meter.meter.u64_counter(name)?;
                vacant.insert(counter.clone());
                counter
            }
        };

        Ok(counter)
    }

    /// Add `value` to the counter `name` of `component`.
    ///
    /// Instrument creation failures are returned. A cancelled or expired
    /// context, or a disabled registry, makes this a no-op.
    pub fn add_count(
        &self,
        ctx: &MeterContext,
        component: &str,
        name: &str,
        value: u64,
        attributes: &[Label],
    ) -> MetricsResult<()> {
        if !self.enabled || ctx.is_done() {
            return Ok(());
        }

        let counter = self.counter(component, name)?;

        let labels: Cow<'_, [Label]> = if ctx.attributes().is_empty() {
            Cow::Borrowed(attributes)
        } else {
            let mut merged = ctx.attributes().to_vec();
            merged.extend_from_slice(attributes);
            Cow::Owned(merged)
        };

        counter.add(value, &labels);
        Ok(())
    }

    /// Same as [`add_count`](Self::add_count) with the error discarded
    pub fn add_count_or_ignore(
        &self,
        ctx: &MeterContext,
        component: &str,
        name: &str,
        value: u64,
        attributes: &[Label],
    ) {
        if let Err(err) = self.add_count(ctx, component, name, value, attributes) {
            tracing::debug!(component, name, error = %err, "metric dropped");
        }
    }

    /// Number of cached meters
    pub fn meter_count(&self) -> usize {
        self.meters.len()
    }

    /// Number of cached counter instruments across all components
    pub fn counter_count(&self) -> usize {
        self.meters.iter().map(|m| m.value().counters.len()).sum()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("enabled", &self.enabled)
            .field("meters", &self.meters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::error::MetricsError;
    use crate::metrics::provider::validate_instrument_name;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Default)]
    struct Recorded {
        meters_created: AtomicUsize,
        counters_created: AtomicUsize,
        totals: Mutex<HashMap<(String, String), u64>>,
        labels: Mutex<Vec<Vec<(String, String)>>>,
    }

    struct TestProvider(Arc<Recorded>);

    struct TestMeter {
        component: String,
        recorded: Arc<Recorded>,
    }

    struct TestCounter {
        key: (String, String),
        recorded: Arc<Recorded>,
    }

    impl MeterProvider for TestProvider {
        fn meter(&self, component: &str) -> Arc<dyn Meter> {
            self.0.meters_created.fetch_add(1, Ordering::SeqCst);
            // widen the race window for concurrent first use
            thread::yield_now();
            Arc::new(TestMeter {
                component: component.to_string(),
                recorded: self.0.clone(),
            })
        }
    }

    impl Meter for TestMeter {
        fn u64_counter(&self, name: &str) -> MetricsResult<Arc<dyn CounterInstrument>> {
            validate_instrument_name(name)?;
            self.recorded.counters_created.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(TestCounter {
                key: (self.component.clone(), name.to_string()),
                recorded: self.recorded.clone(),
            }))
        }
    }

    impl CounterInstrument for TestCounter {
        fn add(&self, value: u64, attributes: &[Label]) {
            *self.recorded.totals.lock().entry(self.key.clone()).or_default() += value;
            self.recorded.labels.lock().push(
                attributes
                    .iter()
                    .map(|l| (l.key().to_string(), l.value().to_string()))
                    .collect(),
            );
        }
    }

    fn registry(enabled: bool) -> (MetricRegistry, Arc<Recorded>) {
        let recorded = Arc::new(Recorded::default());
        let registry = MetricRegistry::new(Arc::new(TestProvider(recorded.clone())), enabled);
        (registry, recorded)
    }

    #[test]
    fn test_meter_cached_per_component() {
        let (registry, recorded) = registry(true);

        let a = registry.meter("svc-a");
        let b = registry.meter("svc-a");
        let _ = registry.meter("svc-b");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(recorded.meters_created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.meter_count(), 2);
    }

    #[test]
    fn test_add_count_accumulates() {
        let (registry, recorded) = registry(true);
        let ctx = MeterContext::background();

        registry.add_count(&ctx, "svc-a", "http.server.bytes.read", 10, &[]).unwrap();
        registry.add_count(&ctx, "svc-a", "http.server.bytes.read", 5, &[]).unwrap();

        let totals = recorded.totals.lock();
        assert_eq!(
            totals[&("svc-a".to_string(), "http.server.bytes.read".to_string())],
            15
        );
        assert_eq!(recorded.counters_created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counters_keyed_by_component() {
        let (registry, recorded) = registry(true);
        let ctx = MeterContext::background();

        registry.add_count(&ctx, "svc-a", "upstream.pcm.bytes.read", 1, &[]).unwrap();
        registry.add_count(&ctx, "svc-b", "upstream.pcm.bytes.read", 2, &[]).unwrap();

        assert_eq!(recorded.counters_created.load(Ordering::SeqCst), 2);
        assert_eq!(registry.counter_count(), 2);
    }

    #[test]
    fn test_instrument_creation_error_propagates() {
        let (registry, _) = registry(true);
        let ctx = MeterContext::background();

        let err = registry
            .add_count(&ctx, "svc-a", "bad name!", 1, &[])
            .unwrap_err();
        assert!(matches!(err, MetricsError::InstrumentCreation { .. }));

        // failed creation leaves nothing cached
        assert_eq!(registry.counter_count(), 0);
        registry.add_count_or_ignore(&ctx, "svc-a", "bad name!", 1, &[]);
    }

    #[test]
    fn test_disabled_registry_never_creates() {
        let (registry, recorded) = registry(false);
        let ctx = MeterContext::background();

        assert!(registry.add_count(&ctx, "svc-a", "bad name!", 1, &[]).is_ok());
        assert!(registry.add_count(&ctx, "svc-a", "http.server.bytes.read", 1, &[]).is_ok());
        let _ = registry.meter("svc-a");

        assert_eq!(recorded.meters_created.load(Ordering::SeqCst), 0);
        assert_eq!(recorded.counters_created.load(Ordering::SeqCst), 0);
        assert_eq!(registry.meter_count(), 0);
    }

    #[test]
    fn test_cancelled_context_is_noop() {
        let (registry, recorded) = registry(true);
        let ctx = MeterContext::background();
        ctx.cancel();

        assert!(registry.add_count(&ctx, "svc-a", "http.server.bytes.read", 9, &[]).is_ok());
        assert!(recorded.totals.lock().is_empty());
    }

    #[test]
    fn test_context_attributes_prepended() {
        let (registry, recorded) = registry(true);
        let ctx = MeterContext::background().with_attributes([Label::new("region", "eu")]);

        registry
            .add_count(
                &ctx,
                "svc-a",
                "object_storage.bytes.read",
                1,
                &[Label::new("bucket", "media")],
            )
            .unwrap();

        let labels = recorded.labels.lock();
        assert_eq!(
            labels[0],
            vec![
                ("region".to_string(), "eu".to_string()),
                ("bucket".to_string(), "media".to_string())
            ]
        );
    }

    #[test]
    fn test_concurrent_first_use_creates_once() {
        const THREADS: usize = 16;

        let (registry, recorded) = registry(true);
        let registry = Arc::new(registry);
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let meter = registry.meter("svc-race");
                    registry
                        .add_count(
                            &MeterContext::background(),
                            "svc-race",
                            "http.server.bytes.written",
                            1,
                            &[],
                        )
                        .unwrap();
                    meter
                })
            })
            .collect();

        let meters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(meters.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(recorded.meters_created.load(Ordering::SeqCst), 1);
        assert_eq!(recorded.counters_created.load(Ordering::SeqCst), 1);
        assert_eq!(
            recorded.totals.lock()[&("svc-race".to_string(), "http.server.bytes.written".to_string())],
            THREADS as u64
        );
    }
}

//! Named metric registry with default labels and text exposition.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::proto::{LabelPair, MetricFamily};
use prometheus::{Encoder, Registry, TextEncoder};

use super::error::MetricsError;
use super::runtime::RuntimeCollector;

/// Owns every metric exposed by the process.
///
/// Built once at startup through `&mut self` methods, then shared read-only
/// (typically behind an `Arc`) with the request handlers. Metric values are
/// updated through the handles returned at registration time, never through
/// the registry itself.
pub struct MetricsRegistry {
    registry: Registry,
    // fq_name -> variable label names in declaration order
    label_order: HashMap<String, Vec<String>>,
    default_labels: BTreeMap<String, String>,
    eventloop_lag_interval: Duration,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        MetricsRegistry {
            registry: Registry::new(),
            label_order: HashMap::new(),
            default_labels: BTreeMap::new(),
            eventloop_lag_interval: Duration::from_secs(1),
        }
    }

    /// Sets how often the runtime collector samples scheduling lag.
    /// Only affects a later call to [`collect_default_metrics`](Self::collect_default_metrics).
    pub fn with_eventloop_lag_interval(mut self, interval: Duration) -> Self {
        self.eventloop_lag_interval = interval;
        self
    }

    /// Adds a collector, failing if any of its metric names is already taken.
    pub fn register_metric(&mut self, metric: Box<dyn Collector>) -> Result<(), MetricsError> {
        let declared: Vec<(String, Vec<String>)> = metric
            .desc()
            .iter()
            .map(|d| (d.fq_name.clone(), d.variable_labels.clone()))
            .collect();
        if let Some((taken, _)) = declared
            .iter()
            .find(|(name, _)| self.label_order.contains_key(name))
        {
            return Err(MetricsError::AlreadyRegistered(taken.clone()));
        }

        self.registry.register(metric)?;
        self.label_order.extend(declared);
        Ok(())
    }

    /// Replaces the labels attached to every exposed sample.
    pub fn set_default_labels<I, K, V>(&mut self, labels: I) -> Result<(), MetricsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut validated = BTreeMap::new();
        for (name, value) in labels {
            let name = name.into();
            if !is_valid_label_name(&name) {
                return Err(MetricsError::InvalidLabelName(name));
            }
            validated.insert(name, value.into());
        }
        self.default_labels = validated;
        Ok(())
    }

    pub fn default_labels(&self) -> &BTreeMap<String, String> {
        &self.default_labels
    }

    /// Registers the process and async-runtime collectors.
    ///
    /// Both refresh their values on every scrape. Process metrics are only
    /// available on Linux.
    pub fn collect_default_metrics(&mut self) -> Result<(), MetricsError> {
        #[cfg(target_os = "linux")]
        self.register_metric(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        let runtime = RuntimeCollector::new()?;
        let sampler = runtime.lag_sampler(self.eventloop_lag_interval);
        self.register_metric(Box::new(runtime))?;
        sampler.spawn();
        Ok(())
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Renders a point-in-time snapshot of all metrics in Prometheus text format.
    pub fn metrics(&self) -> Result<String, MetricsError> {
        let mut families = self.registry.gather();
        self.arrange_labels(&mut families);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Puts each sample's labels back in declaration order (the prometheus
    /// crate sorts them by name) and appends the default labels it lacks.
    fn arrange_labels(&self, families: &mut [MetricFamily]) {
        for family in families.iter_mut() {
            let declared = self.label_order.get(family.get_name());

            for metric in family.mut_metric().iter_mut() {
                let labels = metric.mut_label();
                if let Some(order) = declared {
                    labels.sort_by_key(|l| {
                        order
                            .iter()
                            .position(|n| n == l.get_name())
                            .unwrap_or(order.len())
                    });
                }

                let missing: Vec<LabelPair> = self
                    .default_labels
                    .iter()
                    .filter(|(name, _)| !labels.iter().any(|l| l.get_name() == name.as_str()))
                    .map(|(name, value)| {
                        let mut pair = LabelPair::default();
                        pair.set_name(name.clone());
                        pair.set_value(value.clone());
                        pair
                    })
                    .collect();
                for pair in missing {
                    labels.push(pair);
                }
            }
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    first_ok && !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, IntCounterVec, Opts};

    fn counter(name: &str) -> IntCounter {
        IntCounter::new(name, "test counter").unwrap()
    }

    #[test]
    fn rejects_duplicate_metric_names() {
        let mut registry = MetricsRegistry::new();
        registry.register_metric(Box::new(counter("jobs_total"))).unwrap();

        let err = registry
            .register_metric(Box::new(counter("jobs_total")))
            .unwrap_err();
        assert!(matches!(err, MetricsError::AlreadyRegistered(name) if name == "jobs_total"));
    }

    #[test]
    fn duplicate_name_with_different_labels_is_still_rejected() {
        let mut registry = MetricsRegistry::new();
        registry.register_metric(Box::new(counter("jobs_total"))).unwrap();

        let vec = IntCounterVec::new(Opts::new("jobs_total", "other help"), &["kind"]).unwrap();
        assert!(matches!(
            registry.register_metric(Box::new(vec)),
            Err(MetricsError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn default_labels_are_added_to_every_sample() {
        let mut registry = MetricsRegistry::new();
        let plain = counter("plain_total");
        let labelled =
            IntCounterVec::new(Opts::new("labelled_total", "labelled"), &["kind"]).unwrap();
        registry.register_metric(Box::new(plain.clone())).unwrap();
        registry.register_metric(Box::new(labelled.clone())).unwrap();
        registry.set_default_labels([("app", "demo")]).unwrap();

        plain.inc();
        labelled.with_label_values(&["a"]).inc_by(2);

        let text = registry.metrics().unwrap();
        assert!(text.contains("plain_total{app=\"demo\"} 1"), "{text}");
        assert!(text.contains("labelled_total{kind=\"a\",app=\"demo\"} 2"), "{text}");
    }

    #[test]
    fn sample_label_wins_over_default_label() {
        let mut registry = MetricsRegistry::new();
        let vec = IntCounterVec::new(Opts::new("apps_total", "apps"), &["app"]).unwrap();
        registry.register_metric(Box::new(vec.clone())).unwrap();
        registry.set_default_labels([("app", "default")]).unwrap();

        vec.with_label_values(&["own"]).inc();

        let text = registry.metrics().unwrap();
        assert!(text.contains("apps_total{app=\"own\"} 1"), "{text}");
        assert!(!text.contains("app=\"default\""), "{text}");
    }

    #[test]
    fn invalid_label_names_are_rejected() {
        let mut registry = MetricsRegistry::new();
        for bad in ["", "1app", "__reserved", "app-name"] {
            assert!(
                matches!(
                    registry.set_default_labels([(bad, "x")]),
                    Err(MetricsError::InvalidLabelName(_))
                ),
                "{bad} should be rejected"
            );
        }
        assert!(registry.set_default_labels([("_app", "x")]).is_ok());
    }

    #[test]
    fn metrics_does_not_change_values() {
        let mut registry = MetricsRegistry::new();
        let c = counter("stable_total");
        registry.register_metric(Box::new(c.clone())).unwrap();
        c.inc();

        let first = registry.metrics().unwrap();
        let second = registry.metrics().unwrap();
        assert_eq!(first, second);
        assert_eq!(c.get(), 1);
    }

    #[test]
    fn content_type_is_text_exposition() {
        let registry = MetricsRegistry::new();
        assert!(registry.content_type().starts_with("text/plain; version=0.0.4"));
    }

    #[test]
    fn labels_follow_declaration_order_then_defaults() {
        let mut registry = MetricsRegistry::new();
        let vec =
            IntCounterVec::new(Opts::new("calls_total", "calls"), &["zone", "method", "code"])
                .unwrap();
        registry.register_metric(Box::new(vec.clone())).unwrap();
        registry.set_default_labels([("app", "demo")]).unwrap();

        vec.with_label_values(&["eu", "GET", "200"]).inc();

        let text = registry.metrics().unwrap();
        assert!(
            text.contains(r#"calls_total{zone="eu",method="GET",code="200",app="demo"} 1"#),
            "{text}"
        );
    }

    #[tokio::test]
    async fn failed_default_registration_starts_no_sampler() {
        let mut registry = MetricsRegistry::new();
        let taken = prometheus::IntGauge::new("runtime_workers", "already taken").unwrap();
        registry.register_metric(Box::new(taken)).unwrap();

        let handle = tokio::runtime::Handle::current();
        let tasks_before = handle.metrics().num_alive_tasks();

        assert!(matches!(
            registry.collect_default_metrics(),
            Err(MetricsError::AlreadyRegistered(name)) if name == "runtime_workers"
        ));
        assert_eq!(handle.metrics().num_alive_tasks(), tasks_before);
    }

    #[tokio::test]
    async fn default_metrics_register_once() {
        let mut registry = MetricsRegistry::new();
        registry.collect_default_metrics().unwrap();

        let text = registry.metrics().unwrap();
        assert!(text.contains("runtime_workers"), "{text}");
        assert!(text.contains("runtime_eventloop_lag_seconds"), "{text}");
        #[cfg(target_os = "linux")]
        assert!(text.contains("process_resident_memory_bytes"), "{text}");

        assert!(matches!(
            registry.collect_default_metrics(),
            Err(MetricsError::AlreadyRegistered(_))
        ));
    }
}

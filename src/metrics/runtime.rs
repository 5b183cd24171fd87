//! Async-runtime health gauges: scheduling lag, worker count and live tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, IntGauge};
use tokio::runtime::Handle;

use super::error::MetricsError;

/// Collector reading tokio runtime state at scrape time.
pub struct RuntimeCollector {
    eventloop_lag: Gauge,
    workers: IntGauge,
    alive_tasks: IntGauge,
    // f64 bits of the last sampled lag
    last_lag: Arc<AtomicU64>,
}

impl RuntimeCollector {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(RuntimeCollector {
            eventloop_lag: Gauge::new(
                "runtime_eventloop_lag_seconds",
                "Delay between a task yielding and being polled again, in seconds",
            )?,
            workers: IntGauge::new("runtime_workers", "Number of async runtime worker threads")?,
            alive_tasks: IntGauge::new(
                "runtime_alive_tasks",
                "Number of tasks currently alive in the async runtime",
            )?,
            last_lag: Arc::new(AtomicU64::new(0f64.to_bits())),
        })
    }

    /// Prepares the background lag probe feeding this collector.
    ///
    /// Nothing runs until [`LagSampler::spawn`]; the probe stops once the
    /// collector is dropped.
    pub fn lag_sampler(&self, interval: Duration) -> LagSampler {
        LagSampler {
            target: Arc::downgrade(&self.last_lag),
            interval,
        }
    }
}

/// Periodic scheduling-lag probe for a [`RuntimeCollector`].
pub struct LagSampler {
    target: Weak<AtomicU64>,
    interval: Duration,
}

impl LagSampler {
    /// Starts the probe on the current runtime. Outside a runtime this is a
    /// no-op and the lag gauge stays at zero.
    pub fn spawn(self) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!("no async runtime available, event loop lag will not be sampled");
            return;
        };
        handle.spawn(sample_lag(self.target, self.interval));
    }
}

async fn sample_lag(target: Weak<AtomicU64>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(target) = target.upgrade() else {
            break;
        };

        let started = Instant::now();
        tokio::task::yield_now().await;
        target.store(started.elapsed().as_secs_f64().to_bits(), Ordering::Relaxed);
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.eventloop_lag
            .desc()
            .into_iter()
            .chain(self.workers.desc())
            .chain(self.alive_tasks.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.eventloop_lag
            .set(f64::from_bits(self.last_lag.load(Ordering::Relaxed)));

        if let Ok(handle) = Handle::try_current() {
            let metrics = handle.metrics();
            self.workers.set(metrics.num_workers() as i64);
            self.alive_tasks.set(metrics.num_alive_tasks() as i64);
        }

        let mut families = self.eventloop_lag.collect();
        families.extend(self.workers.collect());
        families.extend(self.alive_tasks.collect());
        families
    }
}

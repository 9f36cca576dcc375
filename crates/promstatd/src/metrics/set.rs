//! One registration's worth of Prometheus metrics.
//!
//! A `MetricSet` is built from a `StatusConfig` and never changes schema
//! afterwards; re-initialization builds a new one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use prometheus::{
    Counter, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use tracing::debug;

use promstat_core::{Buckets, LabelNames, StatusConfig};
use promstat_protocol::{RequestSample, ServerSample};

use super::MetricsError;

/// Labels on the `server_info` metric
const INFO_LABELS: [&str; 4] = ["server_description", "host_name", "mpm", "version"];

/// Prefix for server-scope metric names below the namespace
const SERVER_SUBSYSTEM: &str = "server";

/// Distinct server-scope names accepted per registration
pub const MAX_SERVER_METRICS: usize = 1024;

/// A server-scope metric, created on first use.
enum ServerMetric {
    Counter(Counter),
    Gauge(Gauge),
}

impl ServerMetric {
    fn create(namespace: &str, sample: &ServerSample<'_>) -> Result<Self, MetricsError> {
        let opts = Opts::new(sample.name, format!("Server metric {}", sample.name))
            .namespace(namespace)
            .subsystem(SERVER_SUBSYSTEM);

        if sample.is_counter() {
            Ok(Self::Counter(Counter::with_opts(opts)?))
        } else {
            Ok(Self::Gauge(Gauge::with_opts(opts)?))
        }
    }

    fn collector(&self) -> Box<dyn prometheus::core::Collector> {
        match self {
            Self::Counter(counter) => Box::new(counter.clone()),
            Self::Gauge(gauge) => Box::new(gauge.clone()),
        }
    }

    fn apply(&self, name: &str, value: f64) -> Result<(), MetricsError> {
        match self {
            Self::Counter(counter) => {
                if value < 0.0 {
                    return Err(MetricsError::NegativeCounter {
                        name: name.to_string(),
                        value,
                    });
                }
                counter.inc_by(value);
            }
            Self::Gauge(gauge) => gauge.set(value),
        }
        Ok(())
    }
}

/// Registry plus handles to every metric it exports.
pub struct MetricSet {
    registry: Registry,
    namespace: String,
    label_names: LabelNames,
    requests: IntCounterVec,
    response_time: HistogramVec,
    response_size: HistogramVec,
    server: Mutex<HashMap<String, ServerMetric>>,
}

impl MetricSet {
    /// Builds and registers the schema described by `config`.
    pub fn new(config: &StatusConfig) -> Result<Self, MetricsError> {
        let namespace = config.namespace().to_string();
        let label_names = LabelNames::parse(&config.label_names)?;
        let time_buckets = Buckets::time(&config.time_buckets)?;
        let size_buckets = Buckets::size(&config.size_buckets)?;
        let labels = label_names.as_strs();

        let registry = Registry::new();

        let info = GaugeVec::new(
            Opts::new("server_info", "Static information about the web server")
                .namespace(namespace.as_str()),
            &INFO_LABELS,
        )?;
        info.get_metric_with_label_values(&[
            config.server_description.as_str(),
            config.host_name.as_str(),
            config.mpm_name.as_str(),
            config.version.as_str(),
        ])?
        .set(1.0);

        let initialized = Gauge::with_opts(
            Opts::new(
                "collector_initialized_timestamp_seconds",
                "Unix time the metrics collector was last initialized",
            )
            .namespace(namespace.as_str()),
        )?;
        initialized.set(chrono::Utc::now().timestamp_millis() as f64 / 1000.0);

        let requests = IntCounterVec::new(
            Opts::new("requests_total", "Total number of served requests")
                .namespace(namespace.as_str()),
            &labels,
        )?;

        let response_time = HistogramVec::new(
            HistogramOpts::new("response_time_seconds", "Response time of served requests")
                .namespace(namespace.as_str())
                .buckets(time_buckets.into_vec()),
            &labels,
        )?;

        let response_size = HistogramVec::new(
            HistogramOpts::new("response_size_bytes", "Response size of served requests")
                .namespace(namespace.as_str())
                .buckets(size_buckets.into_vec()),
            &labels,
        )?;

        registry.register(Box::new(info))?;
        registry.register(Box::new(initialized))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(response_time.clone()))?;
        registry.register(Box::new(response_size.clone()))?;

        Ok(Self {
            registry,
            namespace,
            label_names,
            requests,
            response_time,
            response_size,
            server: Mutex::new(HashMap::new()),
        })
    }

    pub fn label_names(&self) -> &LabelNames {
        &self.label_names
    }

    /// Applies a `<name> <value>` server sample.
    pub fn apply_server(&self, payload: &str) -> Result<(), MetricsError> {
        let sample = ServerSample::parse(payload)?;

        let mut metrics = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        let len = metrics.len();
        let metric = match metrics.entry(sample.name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                if len >= MAX_SERVER_METRICS {
                    return Err(MetricsError::TooManyServerMetrics {
                        limit: MAX_SERVER_METRICS,
                    });
                }
                let metric = ServerMetric::create(&self.namespace, &sample)?;
                self.registry.register(metric.collector())?;
                debug!(name = sample.name, "Registered server metric");
                entry.insert(metric)
            }
        };

        metric.apply(sample.name, sample.value)
    }

    /// Applies a completed request: one count plus both observations.
    pub fn apply_request(&self, payload: &str) -> Result<(), MetricsError> {
        let sample = RequestSample::parse(payload, self.label_names.len())?;
        let values = sample.label_values.as_slice();

        // Resolve all children before touching any of them
        let requests = self.requests.get_metric_with_label_values(values)?;
        let response_time = self.response_time.get_metric_with_label_values(values)?;
        let response_size = self.response_size.get_metric_with_label_values(values)?;

        requests.inc();
        response_time.observe(sample.duration_secs);
        response_size.observe(sample.size_bytes);
        Ok(())
    }

    /// Text exposition of everything in the registry.
    pub fn encode(&self) -> Result<Vec<u8>, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

// Copyright 2026 the PBS client authors. MIT license.
//! `MetricRouter`: a thin wrapper around `opentelemetry` meters, counters,
//! and histograms, grounded on
//! `cc/core/telemetry/src/common/metric_utils.{h,cc}`. Production cloud
//! metric exporters (GCP Monarch, AWS CloudWatch, ...) are external
//! collaborators per spec.md §1/§6 and are not implemented here --
//! `MetricRouter` is generic over any `PushMetricExporter`, and this crate
//! ships only the `InMemoryMetricExporter` test double, a direct port of
//! `in_memory_metric_exporter.{h,cc}` / `in_memory_metric_router.h`.

use std::sync::Arc;

use opentelemetry::metrics::Counter;
use opentelemetry::metrics::Histogram;
use opentelemetry::metrics::Meter;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::metrics::ObservableGauge;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use opentelemetry_sdk::metrics::PeriodicReader;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::metrics::Temporality;
use parking_lot::Mutex;

/// Named instruments the HTTP/2 client substrate records, matching the
/// instrument names of spec.md §4.3/§4.4 verbatim so dashboards built
/// against the original C++ client keep working unchanged.
pub mod instruments {
  pub const CLIENT_CONNECT_ERRORS: &str = "client.connect_errors";
  pub const CLIENT_RESPONSE_COUNT: &str = "client.response_count";
  pub const CLIENT_CONNECTION_DURATION: &str = "client.connection_duration";
  pub const CLIENT_SERVER_LATENCY: &str = "client.server_latency";
  pub const CLIENT_REQUEST_DURATION: &str = "client.request_duration";
  pub const CLIENT_REQUEST_BODY_SIZE: &str = "client.request_body_size";
  pub const CLIENT_RESPONSE_BODY_SIZE: &str = "client.response_body_size";
  pub const HTTP_CLIENT_OPEN_CONNECTIONS: &str = "http.client.open_connections";
  pub const HTTP_CLIENT_ACTIVE_REQUESTS: &str = "http.client.active_requests";
  pub const HTTP_CLIENT_ADDRESS_ERRORS: &str = "http.client.address_errors";
}

/// Routes metric creation to a single `opentelemetry` `MeterProvider`.
/// Callers ask for a named meter once and reuse it to build counters,
/// histograms, and observable gauges, mirroring `MetricRouter::GetOrCreateMeter`
/// plus the per-instrument `Counter<uint64_t>`/`Histogram<double>`
/// fields the original hangs off `HttpConnection`/`HttpConnectionPool`.
pub struct MetricRouter {
  provider: SdkMeterProvider,
}

impl MetricRouter {
  /// Builds a router backed by `exporter`, collected every `interval`.
  /// Production callers supply a cloud exporter (an external
  /// collaborator); tests supply `InMemoryMetricExporter`.
  pub fn new(
    exporter: impl PushMetricExporter,
    interval: std::time::Duration,
  ) -> Self {
    let reader = PeriodicReader::builder(exporter)
      .with_interval(interval)
      .build();
    let provider = SdkMeterProvider::builder().with_reader(reader).build();
    MetricRouter { provider }
  }

  pub fn get_or_create_meter(&self, name: &'static str) -> Meter {
    self.provider.meter(name)
  }

  pub fn counter(&self, meter: &Meter, name: &'static str) -> Counter<u64> {
    meter.u64_counter(name).build()
  }

  pub fn histogram_f64(&self, meter: &Meter, name: &'static str) -> Histogram<f64> {
    meter.f64_histogram(name).build()
  }

  pub fn histogram_u64(&self, meter: &Meter, name: &'static str) -> Histogram<u64> {
    meter.u64_histogram(name).build()
  }

  /// Registers an observable gauge whose value is pulled by `callback` at
  /// each collection, matching `ObserveClientActiveRequestsCallback`/
  /// `ObserveClientOpenConnectionsCallback` in the original.
  pub fn observable_gauge_u64(
    &self,
    meter: &Meter,
    name: &'static str,
    callback: impl Fn() -> u64 + Send + Sync + 'static,
  ) -> ObservableGauge<u64> {
    meter
      .u64_observable_gauge(name)
      .with_callback(move |observer| observer.observe(callback(), &[]))
      .build()
  }

  /// Forces an immediate collect+export cycle. Production code relies on
  /// `interval`; tests call this to make exported points observable
  /// without sleeping.
  pub fn force_flush(&self) -> opentelemetry_sdk::error::OTelSdkResult {
    self.provider.force_flush()
  }

  pub fn shutdown(&self) -> opentelemetry_sdk::error::OTelSdkResult {
    self.provider.shutdown()
  }
}

/// A push exporter that accumulates every exported `ResourceMetrics` into
/// an in-memory `Vec` instead of shipping it anywhere, a direct port of
/// `InMemoryMetricExporter` (`in_memory_metric_exporter.{h,cc}`). Clone
/// the handle before handing the original to `MetricRouter::new` so the
/// test retains a reference to read exported data back out.
#[derive(Clone, Default)]
pub struct InMemoryMetricExporter {
  data: Arc<Mutex<Vec<ResourceMetrics>>>,
}

impl InMemoryMetricExporter {
  pub fn new() -> Self {
    Self::default()
  }

  /// A snapshot of every `ResourceMetrics` batch exported so far.
  pub fn get_exported_data(&self) -> Vec<ResourceMetrics> {
    self.data.lock().clone()
  }

  pub fn reset(&self) {
    self.data.lock().clear();
  }
}

impl std::fmt::Debug for InMemoryMetricExporter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("InMemoryMetricExporter").finish()
  }
}

#[async_trait::async_trait]
impl PushMetricExporter for InMemoryMetricExporter {
  async fn export(
    &self,
    metrics: &mut ResourceMetrics,
  ) -> opentelemetry_sdk::error::OTelSdkResult {
    self.data.lock().push(metrics.clone());
    Ok(())
  }

  async fn force_flush(&self) -> opentelemetry_sdk::error::OTelSdkResult {
    Ok(())
  }

  fn shutdown(&self) -> opentelemetry_sdk::error::OTelSdkResult {
    Ok(())
  }

  fn temporality(&self) -> Temporality {
    Temporality::Cumulative
  }
}

/// Finds the metric named `name` within an exported batch, mirroring
/// `GetMetricPointData` in `metric_utils.cc`. Used by tests asserting a
/// specific labeled counter advanced (e.g. `client.address_errors` for one
/// offending URI).
pub fn find_metric_point_data<'a>(
  name: &str,
  data: &'a [ResourceMetrics],
) -> Option<&'a opentelemetry_sdk::metrics::data::Metric> {
  for resource_metrics in data {
    for scope_metrics in &resource_metrics.scope_metrics {
      for metric in &scope_metrics.metrics {
        if metric.name.as_ref() == name {
          return Some(metric);
        }
      }
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::time::Duration;

  #[tokio::test]
  async fn counter_increments_are_observable_after_flush() {
    let exporter = InMemoryMetricExporter::new();
    let router = MetricRouter::new(exporter.clone(), Duration::from_secs(3600));
    let meter = router.get_or_create_meter("pbs_http2_client");
    let counter = router.counter(&meter, instruments::CLIENT_CONNECT_ERRORS);
    counter.add(1, &[]);
    counter.add(2, &[]);
    router.force_flush().expect("flush should succeed");

    let data = exporter.get_exported_data();
    assert!(find_metric_point_data(instruments::CLIENT_CONNECT_ERRORS, &data).is_some());
  }

  #[tokio::test]
  async fn observable_gauge_reflects_callback_value_at_flush_time() {
    let exporter = InMemoryMetricExporter::new();
    let router = MetricRouter::new(exporter.clone(), Duration::from_secs(3600));
    let meter = router.get_or_create_meter("pbs_http2_client");
    let _gauge = router.observable_gauge_u64(
      &meter,
      instruments::HTTP_CLIENT_OPEN_CONNECTIONS,
      || 2,
    );
    router.force_flush().expect("flush should succeed");

    let data = exporter.get_exported_data();
    assert!(
      find_metric_point_data(instruments::HTTP_CLIENT_OPEN_CONNECTIONS, &data).is_some()
    );
  }

  #[test]
  fn reset_clears_previously_exported_batches() {
    let exporter = InMemoryMetricExporter::new();
    exporter.data.lock().push(ResourceMetrics {
      resource: opentelemetry_sdk::Resource::builder().build(),
      scope_metrics: Vec::new(),
    });
    assert_eq!(exporter.get_exported_data().len(), 1);
    exporter.reset();
    assert_eq!(exporter.get_exported_data().len(), 0);
  }
}

// Copyright 2026 the PBS client authors. MIT license.
//! One HTTP/2 session to a `(host, port, scheme)`, grounded on
//! `cc/core/http2_client/src/http_connection.{h,cc}`. `nghttp2`'s
//! connection/session/worker-thread trio is replaced end-to-end by a
//! `hyper_util` legacy client plus `tokio::spawn`ed tasks (spec.md §2/§5
//! expansion): `hyper_util`'s client already multiplexes HTTP/2 streams
//! over a pooled connection, so this type models one *logical*
//! multiplexed session rather than a literal single socket.

use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use bytes::Bytes;
use http::header::HeaderName;
use http::header::HeaderValue;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use opentelemetry::KeyValue;
use tokio::net::TcpStream;

use pbs_core::result::failure;
use pbs_core::result::retry;
use pbs_core::result::success;
use pbs_core::AsyncContext;
use pbs_core::ConcurrentMap;
use pbs_core::ExecutionResult;
use pbs_core::ExecutionResultOr;
use pbs_core::StatusCode;
use pbs_core::Uuid;
use pbs_telemetry::instruments;
use pbs_telemetry::MetricRouter;

use crate::http_types::HttpMethod;
use crate::http_types::HttpRequest;
use crate::http_types::HttpResponse;
use crate::status::status_code_to_execution_result;
use crate::uri::escaped_uri_with_query;

pub const DEFAULT_HTTP2_READ_TIMEOUT: Duration = Duration::from_secs(60);

const X_GSCP_CLIENT_ACTIVITY_ID: &str = "x-gscp-client-activity-id";

const INITIALIZING: u8 = 0;
const READY: u8 = 1;
const DROPPED: u8 = 2;
const STOPPED: u8 = 3;

type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

struct ConnectionMetrics {
  connect_errors: opentelemetry::metrics::Counter<u64>,
  response_count: opentelemetry::metrics::Counter<u64>,
  server_latency: opentelemetry::metrics::Histogram<f64>,
  request_duration: opentelemetry::metrics::Histogram<f64>,
  request_body_size: opentelemetry::metrics::Histogram<u64>,
  response_body_size: opentelemetry::metrics::Histogram<u64>,
  connection_duration: opentelemetry::metrics::Histogram<f64>,
}

impl ConnectionMetrics {
  fn new(router: &MetricRouter) -> Self {
    let meter = router.get_or_create_meter("pbs_http2_client.connection");
    ConnectionMetrics {
      connect_errors: router.counter(&meter, instruments::CLIENT_CONNECT_ERRORS),
      response_count: router.counter(&meter, instruments::CLIENT_RESPONSE_COUNT),
      server_latency: router.histogram_f64(&meter, instruments::CLIENT_SERVER_LATENCY),
      request_duration: router.histogram_f64(&meter, instruments::CLIENT_REQUEST_DURATION),
      request_body_size: router.histogram_u64(&meter, instruments::CLIENT_REQUEST_BODY_SIZE),
      response_body_size: router.histogram_u64(&meter, instruments::CLIENT_RESPONSE_BODY_SIZE),
      connection_duration: router.histogram_f64(&meter, instruments::CLIENT_CONNECTION_DURATION),
    }
  }
}

/// One HTTP/2 session, carrying its own pending-call table and state
/// machine (`Initializing`/`Ready`/`Dropped`/`Stopped`, spec.md §3).
pub struct HttpConnection {
  host: String,
  service: String,
  is_https: bool,
  read_timeout: Duration,
  state: AtomicU8,
  client: once_cell::sync::OnceCell<HyperClient>,
  pending_network_calls: ConcurrentMap<Uuid, AsyncContext<HttpRequest, HttpResponse>>,
  metrics: Option<Arc<ConnectionMetrics>>,
  connection_created_at: parking_lot::Mutex<Option<Instant>>,
}

impl HttpConnection {
  pub fn new(
    host: impl Into<String>,
    service: impl Into<String>,
    is_https: bool,
    read_timeout: Duration,
    metric_router: Option<&MetricRouter>,
  ) -> Self {
    HttpConnection {
      host: host.into(),
      service: service.into(),
      is_https,
      read_timeout,
      state: AtomicU8::new(INITIALIZING),
      client: once_cell::sync::OnceCell::new(),
      pending_network_calls: ConcurrentMap::new(),
      metrics: metric_router.map(|r| Arc::new(ConnectionMetrics::new(r))),
      connection_created_at: parking_lot::Mutex::new(None),
    }
  }

  /// Builds the `hyper` client and installs TLS defaults. Does not block
  /// on connectivity; readiness is confirmed by `run`'s connect probe,
  /// mirroring nghttp2's `on_connect` firing asynchronously after `Init`.
  pub fn init(&self) -> ExecutionResultOr<()> {
    let https = HttpsConnectorBuilder::new()
      .with_webpki_roots()
      .https_or_http()
      .enable_http2()
      .build();
    self
      .client
      .set(Client::builder(TokioExecutor::new()).build(https))
      .map_err(|_| failure(StatusCode::CoreUtilsInvalidInput))?;
    Ok(())
  }

  /// Launches the connectivity probe. Equivalent of spawning the nghttp2
  /// IO worker thread and waiting for its `on_connect`/`on_error`
  /// callback: a background task attempts a TCP connect to
  /// `(host, service)` and flips `Ready`/`Dropped` accordingly.
  pub fn run(self: &Arc<Self>) -> ExecutionResultOr<()> {
    let this = Arc::clone(self);
    tokio::spawn(async move {
      let address = format!("{}:{}", this.host, this.service);
      match tokio::time::timeout(this.read_timeout, TcpStream::connect(&address)).await {
        Ok(Ok(_stream)) => {
          this.state.store(READY, Ordering::SeqCst);
          *this.connection_created_at.lock() = Some(Instant::now());
        }
        _ => {
          this.on_connection_error();
        }
      }
    });
    Ok(())
  }

  pub fn is_ready(&self) -> bool {
    self.state.load(Ordering::SeqCst) == READY
  }

  pub fn is_dropped(&self) -> bool {
    self.state.load(Ordering::SeqCst) == DROPPED
  }

  pub fn active_client_requests_size(&self) -> usize {
    self.pending_network_calls.len()
  }

  /// Resets connection state so the slot can be reinitialized by the
  /// pool's recycler without disturbing round-robin indices.
  pub fn reset(&self) {
    self.state.store(INITIALIZING, Ordering::SeqCst);
  }

  fn on_connection_error(&self) {
    let was_ready = self.state.swap(DROPPED, Ordering::SeqCst) == READY;
    if let Some(metrics) = &self.metrics {
      metrics.connect_errors.add(
        1,
        &[
          KeyValue::new("server.address", self.host.clone()),
          KeyValue::new("server.port", self.service.clone()),
          KeyValue::new("url.scheme", if self.is_https { "https" } else { "http" }),
        ],
      );
    }
    self.record_connection_duration();
    self.cancel_pending_callbacks(was_ready);
  }

  fn record_connection_duration(&self) {
    let Some(metrics) = &self.metrics else { return };
    let Some(created_at) = self.connection_created_at.lock().take() else { return };
    metrics.connection_duration.record(created_at.elapsed().as_secs_f64(), &[]);
  }

  /// Drains every pending callback, matching `CancelPendingCallbacks`:
  /// `Retry(ConnectionDropped)` if the connection was dropped mid-flight,
  /// `Failure(ConnectionDropped)` if it was cleanly stopped. Erase races
  /// with a concurrent completion are resolved in favor of whichever side
  /// wins the erase.
  fn cancel_pending_callbacks(&self, was_dropped_not_stopped: bool) {
    for key in self.pending_network_calls.keys() {
      let Some(ctx) = self.pending_network_calls.erase(&key) else { continue };
      let result = if was_dropped_not_stopped {
        retry(StatusCode::Http2ClientConnectionDropped)
      } else {
        failure(StatusCode::Http2ClientConnectionDropped)
      };
      ctx.set_result(result);
      ctx.finish();
    }
  }

  /// Posts session shutdown, stops accepting new work, and drains
  /// pending callbacks as `Failure(ConnectionDropped)`.
  pub fn stop(&self) {
    self.state.store(STOPPED, Ordering::SeqCst);
    self.record_connection_duration();
    self.cancel_pending_callbacks(false);
  }

  /// Submits `ctx` for execution. Returns immediately with the outcome
  /// of *accepting* the request for dispatch, not its eventual result --
  /// the context's own callback carries that, per spec.md §4.3.
  pub fn execute(self: &Arc<Self>, ctx: AsyncContext<HttpRequest, HttpResponse>) -> ExecutionResult {
    if !self.is_ready() {
      return retry(StatusCode::Http2ClientNoConnectionEstablished);
    }

    let request_id = Uuid::generate();
    let (outcome, _) = self.pending_network_calls.insert(request_id, ctx.clone());
    if outcome == pbs_core::concurrent_map::InsertOutcome::AlreadyExists {
      return failure(StatusCode::Unknown);
    }

    let this = Arc::clone(self);
    tokio::spawn(async move {
      this.send_http_request(request_id, ctx).await;
    });
    success()
  }

  async fn send_http_request(
    self: Arc<Self>,
    request_id: Uuid,
    ctx: AsyncContext<HttpRequest, HttpResponse>,
  ) {
    let method = match ctx.request().method {
      HttpMethod::Get => http::Method::GET,
      HttpMethod::Post => http::Method::POST,
      HttpMethod::Put | HttpMethod::Unknown => {
        if self.pending_network_calls.erase(&request_id).is_none() {
          return;
        }
        ctx.set_result(failure(StatusCode::Http2ClientHttpMethodNotSupported));
        ctx.finish();
        return;
      }
    };

    let request = ctx.request();
    let body_len = request.body.length() as u64;
    if let Some(metrics) = &self.metrics {
      metrics.request_body_size.record(body_len, &[]);
    }

    let escaped_path =
      match escaped_uri_with_query(&request.path, request.query.as_deref()) {
        Ok(path) => path,
        Err(result) => {
          if self.pending_network_calls.erase(&request_id).is_none() {
            return;
          }
          ctx.set_result(result);
          ctx.finish();
          return;
        }
      };

    let mut builder = http::Request::builder().method(method).uri(&escaped_path);
    for (name, value) in request.headers.iter() {
      builder = builder.header(name, value);
    }
    builder = builder
      .header(http::header::CONTENT_LENGTH, body_len)
      .header(
        HeaderName::from_static(X_GSCP_CLIENT_ACTIVITY_ID),
        HeaderValue::from_str(&ctx.activity_id().to_string())
          .unwrap_or_else(|_| HeaderValue::from_static("")),
      );

    let body = Full::new(Bytes::copy_from_slice(request.body.as_slice()));
    let outgoing = match builder.body(body) {
      Ok(req) => req,
      Err(_) => {
        if self.pending_network_calls.erase(&request_id).is_none() {
          return;
        }
        ctx.set_result(failure(StatusCode::Http2ClientInvalidUri));
        ctx.finish();
        return;
      }
    };

    let Some(client) = self.client.get() else {
      if self.pending_network_calls.erase(&request_id).is_none() {
        return;
      }
      ctx.set_result(retry(StatusCode::Http2ClientNoConnectionEstablished));
      ctx.finish();
      return;
    };

    let submitted_at = Instant::now();
    let response = match tokio::time::timeout(self.read_timeout, client.request(outgoing)).await {
      Ok(Ok(response)) => response,
      _ => {
        if self.pending_network_calls.erase(&request_id).is_none() {
          return;
        }
        ctx.set_result(retry(StatusCode::Http2ClientFailedToIssueHttpRequest));
        ctx.finish();
        self.on_connection_error();
        return;
      }
    };

    if let Some(metrics) = &self.metrics {
      metrics.server_latency.record(submitted_at.elapsed().as_secs_f64(), &[]);
    }

    let status = response.status().as_u16();
    let (parts, incoming) = response.into_parts();
    let mut http_response = HttpResponse::new(status);
    http_response.headers = parts.headers;

    let mut result = status_code_to_execution_result(status);
    match incoming.collect().await {
      Ok(collected) => {
        let bytes = collected.to_bytes();
        if let Some(metrics) = &self.metrics {
          metrics.response_body_size.record(bytes.len() as u64, &[]);
        }
        http_response.body.extend_from_slice(&bytes);
      }
      Err(_) => {
        if result.successful() {
          result = retry(StatusCode::Http2ClientHttpRequestCloseError);
        }
      }
    }

    if let Some(metrics) = &self.metrics {
      metrics.response_count.add(1, &[KeyValue::new("status", status as i64)]);
      metrics.request_duration.record(submitted_at.elapsed().as_secs_f64(), &[]);
    }

    if self.pending_network_calls.erase(&request_id).is_none() {
      return;
    }
    ctx.set_response(http_response);
    ctx.set_result(result);
    ctx.finish();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn fresh_connection_starts_initializing_not_ready() {
    let connection = HttpConnection::new("localhost", "1", false, DEFAULT_HTTP2_READ_TIMEOUT, None);
    assert!(!connection.is_ready());
    assert!(!connection.is_dropped());
  }

  #[tokio::test]
  async fn execute_before_ready_returns_retry_without_finishing_callback() {
    let connection = Arc::new(HttpConnection::new(
      "localhost",
      "1",
      false,
      DEFAULT_HTTP2_READ_TIMEOUT,
      None,
    ));
    let clock = pbs_core::time::SystemClock;
    let ctx: AsyncContext<HttpRequest, HttpResponse> =
      AsyncContext::new(HttpRequest::get("https://localhost/"), |_| {}, &clock);
    let result = connection.execute(ctx);
    assert_eq!(result.status_code, StatusCode::Http2ClientNoConnectionEstablished);
  }
}

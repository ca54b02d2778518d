// Copyright 2026 the PBS client authors. MIT license.
//! End-to-end tests driving a real in-process HTTP server against
//! `PbsClient`, exercising spec.md §8's single-endpoint happy path and
//! 412-precondition-failed reconciliation scenarios. Harness adapted from
//! `pbs_http2_client`'s `tests/end_to_end.rs`.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use http::Request;
use http::Response;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use pbs_core::time::SystemClock;
use pbs_core::AsyncContext;
use pbs_core::ExecutionStatus;
use pbs_core::Uuid;
use pbs_http2_client::AsyncHttpClient;
use pbs_http2_client::HttpConnectionPool;
use pbs_transaction_client::ConsumeBudgetMetadata;
use pbs_transaction_client::ConsumeBudgetTransactionRequest;
use pbs_transaction_client::ConsumeBudgetTransactionResponse;
use pbs_transaction_client::PbsClient;
use pbs_transaction_client::TransactionExecutionPhase;
use pbs_transaction_client::TransactionPhaseRequest;
use pbs_transaction_client::TransactionPhaseResponse;
use pretty_assertions::assert_eq;

/// Counts requests per path and hands each one to `respond` to decide the
/// status code and JSON body.
struct Handlers {
  counts: Mutex<HashMap<String, u32>>,
  respond: Box<dyn Fn(&str, u32, &[u8]) -> (u16, serde_json::Value) + Send + Sync>,
}

async fn start_server(handlers: Arc<Handlers>) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
  let addr = listener.local_addr().expect("local_addr");

  tokio::spawn(async move {
    loop {
      let Ok((stream, _)) = listener.accept().await else { break };
      let io = TokioIo::new(stream);
      let handlers = Arc::clone(&handlers);
      tokio::spawn(async move {
        let handlers = Arc::clone(&handlers);
        let service = hyper::service::service_fn(move |req: Request<hyper::body::Incoming>| {
          let handlers = Arc::clone(&handlers);
          async move {
            let path = req.uri().path().to_string();
            let body = req.into_body().collect().await.map(|b| b.to_bytes()).unwrap_or_default();
            let attempt = {
              let mut counts = handlers.counts.lock();
              let count = counts.entry(path.clone()).or_insert(0);
              *count += 1;
              *count
            };
            let (status, json) = (handlers.respond)(&path, attempt, &body);
            let bytes = serde_json::to_vec(&json).expect("json body serializes");
            let body: BoxBody<Bytes, Infallible> =
              Full::new(Bytes::from(bytes)).map_err(|never| match never {}).boxed();
            Ok::<_, Infallible>(Response::builder().status(status).body(body).expect("response"))
          }
        });
        let _ = AutoBuilder::new(TokioExecutor::new()).serve_connection(io, service).await;
      });
    }
  });

  addr
}

async fn make_client(base: &str) -> PbsClient {
  let pool = Arc::new(HttpConnectionPool::new(1, Duration::from_secs(5), None));
  // Warm the pool's connection before exercising PbsClient: HttpConnection
  // starts `Initializing` and only flips `Ready` once its background
  // connect probe completes, matching the original's asynchronous
  // `on_connect`.
  let connection = pool.get_connection(base).expect("connection should be created");
  for _ in 0..50 {
    if connection.is_ready() {
      break;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
  assert!(connection.is_ready(), "connect probe should have completed by now");

  let http_client = Arc::new(AsyncHttpClient::new(pool));
  let clock: Arc<dyn pbs_core::Clock> = Arc::new(SystemClock);
  PbsClient::new(vec![base.to_string()], "tenant-a", http_client, clock, None)
}

#[tokio::test(flavor = "multi_thread")]
async fn single_endpoint_happy_path_drives_five_remote_calls_with_monotonic_timestamps() {
  let counter = Arc::new(AtomicI64::new(0));
  let handlers = Arc::new(Handlers {
    counts: Mutex::new(HashMap::new()),
    respond: Box::new(move |_path, _attempt, _body| {
      let timestamp = counter.fetch_add(1, Ordering::SeqCst) + 1;
      (200, serde_json::json!({ "last_execution_timestamp": timestamp }))
    }),
  });
  let addr = start_server(Arc::clone(&handlers)).await;
  let base = format!("http://{addr}");
  let client = make_client(&base).await;
  let clock = SystemClock;

  let transaction_id = Uuid::generate();
  let begin_ctx: AsyncContext<ConsumeBudgetTransactionRequest, ConsumeBudgetTransactionResponse> =
    AsyncContext::new(
      ConsumeBudgetTransactionRequest {
        transaction_id,
        transaction_secret: "secret".to_string(),
        budget_keys: vec![ConsumeBudgetMetadata::new("bk1", 1000, 1)],
      },
      |_ctx| {},
      &clock,
    );
  let begin_result = client.initiate_consume_budget_transaction(&begin_ctx).await;
  assert_eq!(begin_result.status, ExecutionStatus::Success);
  let mut last_timestamp = begin_ctx.response().expect("response set").last_execution_timestamp;

  for phase in [
    TransactionExecutionPhase::Prepare,
    TransactionExecutionPhase::Commit,
    TransactionExecutionPhase::Notify,
    TransactionExecutionPhase::End,
  ] {
    let ctx: AsyncContext<TransactionPhaseRequest, TransactionPhaseResponse> =
      AsyncContext::new(TransactionPhaseRequest { transaction_id, phase }, |_ctx| {}, &clock);
    let result = client.execute_transaction_phase(&ctx).await;
    assert_eq!(result.status, ExecutionStatus::Success, "phase {phase} should succeed");
    let response = ctx.response().expect("response set");
    assert!(
      response.last_execution_timestamp > last_timestamp,
      "timestamp should advance monotonically across phases"
    );
    last_timestamp = response.last_execution_timestamp;
  }

  let total_requests: u32 = handlers.counts.lock().values().sum();
  assert_eq!(total_requests, 5, "begin + 4 phases should issue exactly 5 requests");
}

#[tokio::test(flavor = "multi_thread")]
async fn precondition_failure_triggers_exactly_one_reconciliation_then_succeeds() {
  let handlers = Arc::new(Handlers {
    counts: Mutex::new(HashMap::new()),
    respond: Box::new(move |path, attempt, body| {
      if path == pbs_transaction_client::wire::BEGIN_BUDGET_CONSUMPTION_PATH {
        return (200, serde_json::json!({ "last_execution_timestamp": 1 }));
      }
      if path == pbs_transaction_client::wire::GET_STATUS_PATH {
        return (
          200,
          serde_json::json!({
            "last_execution_timestamp": 42,
            "has_failures": false,
            "is_expired": false
          }),
        );
      }
      // executePhase: fail the first Prepare attempt with a precondition
      // failure, succeed every subsequent attempt.
      let parsed: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();
      let phase = parsed.get("phase").and_then(|v| v.as_str()).unwrap_or_default();
      if phase == "PREPARE" && attempt == 1 {
        return (412, serde_json::json!({ "last_execution_timestamp": 1 }));
      }
      (200, serde_json::json!({ "last_execution_timestamp": 100 }))
    }),
  });
  let addr = start_server(Arc::clone(&handlers)).await;
  let base = format!("http://{addr}");
  let client = make_client(&base).await;
  let clock = SystemClock;

  let transaction_id = Uuid::generate();
  let begin_ctx: AsyncContext<ConsumeBudgetTransactionRequest, ConsumeBudgetTransactionResponse> =
    AsyncContext::new(
      ConsumeBudgetTransactionRequest {
        transaction_id,
        transaction_secret: "secret".to_string(),
        budget_keys: vec![ConsumeBudgetMetadata::new("bk1", 1000, 1)],
      },
      |_ctx| {},
      &clock,
    );
  let begin_result = client.initiate_consume_budget_transaction(&begin_ctx).await;
  assert_eq!(begin_result.status, ExecutionStatus::Success);

  let prepare_ctx: AsyncContext<TransactionPhaseRequest, TransactionPhaseResponse> =
    AsyncContext::new(
      TransactionPhaseRequest { transaction_id, phase: TransactionExecutionPhase::Prepare },
      |_ctx| {},
      &clock,
    );
  let result = client.execute_transaction_phase(&prepare_ctx).await;
  assert_eq!(result.status, ExecutionStatus::Success, "reconciled retry should succeed");

  let counts = handlers.counts.lock();
  let execute_phase_count =
    *counts.get(pbs_transaction_client::wire::EXECUTE_PHASE_PATH).unwrap_or(&0);
  let get_status_count =
    *counts.get(pbs_transaction_client::wire::GET_STATUS_PATH).unwrap_or(&0);
  assert_eq!(execute_phase_count, 2, "one failed attempt plus one reconciled retry");
  assert_eq!(get_status_count, 1, "exactly one reconciliation lookup");
  assert_eq!(
    execute_phase_count + get_status_count,
    3,
    "Prepare should cost exactly 3 POSTs end to end"
  );
}

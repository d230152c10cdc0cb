//! End-to-end middleware tests through an in-process axum router.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use tokio::sync::mpsc;
use tower::ServiceExt;

use mantis_core::auth::AuthCredential;
use mantis_core::error::MantisError;
use mantis_core::observation::MetricObservation;
use mantis_middleware::{
    metric_fn, DeliveryOutcome, MetricTransport, ProcessMetricState, RequestInstrumentor,
};

type Sent = (String, f64);

struct RecordingTransport {
    tx: mpsc::UnboundedSender<Sent>,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl MetricTransport for RecordingTransport {
    async fn send_metric(&self, name: &str, value: f64) -> DeliveryOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let _ = self.tx.send((name.to_string(), value));
        if self.fail {
            DeliveryOutcome::Failed
        } else {
            DeliveryOutcome::Delivered
        }
    }
}

fn recorder() -> (Arc<RecordingTransport>, mpsc::UnboundedReceiver<Sent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingTransport { tx, fail: false, delay: Duration::ZERO }), rx)
}

fn app(instrumentor: &RequestInstrumentor) -> Router {
    let routes = Router::new()
        .route("/", get(|| async { "hello" }))
        .route(
            "/status/:code",
            get(|Path(code): Path<u16>| async move { StatusCode::from_u16(code).unwrap() }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(30)).await;
                "slow"
            }),
        );
    instrumentor.wrap(routes)
}

async fn call(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn recv_n(rx: &mut mpsc::UnboundedReceiver<Sent>, n: usize) -> Vec<Sent> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let item = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for metric")
            .expect("channel closed");
        out.push(item);
    }
    out
}

fn names(sent: &[Sent]) -> Vec<&str> {
    sent.iter().map(|(n, _)| n.as_str()).collect()
}

#[tokio::test]
async fn three_requests_one_error_scenario() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    let mut rates = Vec::new();
    for uri in ["/", "/status/500", "/"] {
        call(&app, uri).await;
        let sent = recv_n(&mut rx, 3).await;
        assert_eq!(names(&sent), vec!["latency", "requests_per_second", "error_rate"]);
        rates.push(sent[2].1);
    }

    assert_eq!(rates[0], 0.0);
    assert_eq!(rates[1], 50.0);
    assert!((rates[2] - 33.333).abs() < 0.01, "error rate {}", rates[2]);

    let state = inst.state();
    assert_eq!(state.total_requests(), 3);
    assert_eq!(state.total_errors(), 1);
}

#[tokio::test]
async fn response_passes_through_untouched() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    let (status, body) = call(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");

    let (status, _) = call(&app, "/status/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    recv_n(&mut rx, 6).await;
    assert_eq!(inst.state().total_errors(), 1);
}

#[tokio::test]
async fn custom_metrics_run_first_in_configured_order() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport)
        .metric(metric_fn("path_len", |ctx| async move {
            MetricObservation::new("path_len", ctx.request.path().len() as f64).map(Some)
        }))
        .metric(metric_fn("status", |ctx| async move {
            let code = ctx.response.status.map(|s| s.as_u16()).unwrap_or(0);
            MetricObservation::new("status", f64::from(code)).map(Some)
        }))
        .build();
    assert_eq!(
        inst.pipeline_labels(),
        vec!["path_len", "status", "latency", "requests_per_second", "error_rate"]
    );

    let app = app(&inst);
    call(&app, "/status/201").await;
    let sent = recv_n(&mut rx, 5).await;
    assert_eq!(
        names(&sent),
        vec!["path_len", "status", "latency", "requests_per_second", "error_rate"]
    );
    assert_eq!(sent[0].1, "/status/201".len() as f64);
    assert_eq!(sent[1].1, 201.0);
}

#[tokio::test]
async fn none_result_produces_no_dispatch() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport)
        .metric(metric_fn("errors_only", |ctx| async move {
            if ctx.response.is_error() {
                MetricObservation::new("failed_request", 1.0).map(Some)
            } else {
                Ok(None)
            }
        }))
        .build();
    let app = app(&inst);

    call(&app, "/").await;
    let sent = recv_n(&mut rx, 3).await;
    assert_eq!(names(&sent), vec!["latency", "requests_per_second", "error_rate"]);

    call(&app, "/status/503").await;
    let sent = recv_n(&mut rx, 4).await;
    assert_eq!(sent[0].0, "failed_request");
}

#[tokio::test]
async fn failing_metric_functions_do_not_suppress_others() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport)
        .metric(metric_fn("broken", |_ctx| async move {
            Err::<Option<MetricObservation>, _>(MantisError::metric("broken", "boom"))
        }))
        .metric(metric_fn("panics", |_ctx| async move {
            if true {
                panic!("metric blew up");
            }
            Ok(None)
        }))
        .metric(metric_fn("after", |_ctx| async move {
            MetricObservation::new("after", 1.0).map(Some)
        }))
        .build();
    let app = app(&inst);

    let (status, _) = call(&app, "/").await;
    assert_eq!(status, StatusCode::OK);

    let sent = recv_n(&mut rx, 4).await;
    assert_eq!(names(&sent), vec!["after", "latency", "requests_per_second", "error_rate"]);

    let obs = inst.observability();
    assert_eq!(obs.metric_failures.get(&[("metric", "broken"), ("cause", "error")]), 1);
    assert_eq!(obs.metric_failures.get(&[("metric", "panics"), ("cause", "panic")]), 1);
}

#[tokio::test]
async fn delivery_failure_does_not_delay_response() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = Arc::new(RecordingTransport {
        tx,
        fail: true,
        delay: Duration::from_millis(300),
    });
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    let started = Instant::now();
    let (status, body) = call(&app, "/").await;
    assert!(started.elapsed() < Duration::from_millis(300));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "hello");

    recv_n(&mut rx, 3).await;
    // The last delivery's outcome is recorded right after the send returns.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(inst.observability().deliveries.get(&[("result", "failed")]), 3);
}

struct PanickingTransport {
    tx: mpsc::UnboundedSender<Sent>,
    panic_on: &'static str,
}

#[async_trait]
impl MetricTransport for PanickingTransport {
    async fn send_metric(&self, name: &str, value: f64) -> DeliveryOutcome {
        if name == self.panic_on {
            panic!("transport blew up on {name}");
        }
        let _ = self.tx.send((name.to_string(), value));
        DeliveryOutcome::Delivered
    }
}

#[tokio::test]
async fn slow_delivery_does_not_inflate_latency() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = Arc::new(RecordingTransport {
        tx,
        fail: false,
        delay: Duration::from_millis(400),
    });
    let inst = RequestInstrumentor::builder(transport)
        .metric(metric_fn("a", |_ctx| async move { MetricObservation::new("a", 1.0).map(Some) }))
        .metric(metric_fn("b", |_ctx| async move { MetricObservation::new("b", 1.0).map(Some) }))
        .build();
    let app = app(&inst);

    call(&app, "/").await;
    let sent = tokio::time::timeout(Duration::from_secs(5), async {
        let mut out = Vec::new();
        while out.len() < 5 {
            out.push(rx.recv().await.unwrap());
        }
        out
    })
    .await
    .unwrap();

    assert_eq!(names(&sent), vec!["a", "b", "latency", "requests_per_second", "error_rate"]);
    let latency = sent[2].1;
    assert!(latency < 200.0, "latency for an instant handler was {latency} ms");
}

#[tokio::test]
async fn panicking_transport_does_not_stop_remaining_deliveries() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let transport = Arc::new(PanickingTransport { tx, panic_on: "first" });
    let inst = RequestInstrumentor::builder(transport)
        .metric(metric_fn("first", |_ctx| async move {
            MetricObservation::new("first", 1.0).map(Some)
        }))
        .build();
    let app = app(&inst);

    call(&app, "/").await;
    let sent = recv_n(&mut rx, 3).await;
    assert_eq!(names(&sent), vec!["latency", "requests_per_second", "error_rate"]);

    // Outcome bookkeeping follows the last send.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let obs = inst.observability();
    assert_eq!(obs.deliveries.get(&[("result", "failed")]), 1);
    assert_eq!(obs.deliveries.get(&[("result", "ok")]), 3);
    assert_eq!(obs.delivery_duration.count(&[]), 4);
    assert_eq!(obs.hooks_pending.get(&[]), 0);
}

#[tokio::test]
async fn latency_covers_handler_time() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    call(&app, "/slow").await;
    let sent = recv_n(&mut rx, 3).await;
    assert_eq!(sent[0].0, "latency");
    assert!(sent[0].1 >= 30.0, "latency {} ms", sent[0].1);
}

#[tokio::test]
async fn dropped_response_still_fires_hook_once() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/status/500").body(Body::empty()).unwrap())
        .await
        .unwrap();
    drop(resp);

    let sent = recv_n(&mut rx, 3).await;
    assert_eq!(names(&sent), vec!["latency", "requests_per_second", "error_rate"]);
    assert_eq!(sent[2].1, 100.0);

    let obs = inst.observability();
    let fired = obs.hooks_fired.get(&[("outcome", "completed")])
        + obs.hooks_fired.get(&[("outcome", "aborted")]);
    assert_eq!(fired, 1);
    assert_eq!(inst.state().total_errors(), 1);
}

#[tokio::test]
async fn completed_body_is_reported_as_completed() {
    let (transport, mut rx) = recorder();
    let inst = RequestInstrumentor::builder(transport).build();
    let app = app(&inst);

    call(&app, "/").await;
    recv_n(&mut rx, 3).await;
    assert_eq!(inst.observability().hooks_fired.get(&[("outcome", "completed")]), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_are_all_counted() {
    let (transport, mut rx) = recorder();
    let state = Arc::new(ProcessMetricState::new());
    let inst = RequestInstrumentor::builder(transport)
        .state(Arc::clone(&state))
        .build();
    let app = app(&inst);

    let mut handles = Vec::new();
    for i in 0..20 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let uri = if i % 4 == 0 { "/status/500" } else { "/slow" };
            call(&app, uri).await
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let sent = recv_n(&mut rx, 60).await;
    assert_eq!(state.total_requests(), 20);
    assert_eq!(state.total_errors(), 5);
    for (name, value) in &sent {
        if name == "error_rate" {
            assert!((0.0..=100.0).contains(value), "error rate {value}");
        }
        if name == "latency" {
            assert!(*value >= 0.0);
        }
    }
}

#[tokio::test]
async fn shared_state_spans_instrumentors() {
    let state = Arc::new(ProcessMetricState::new());
    let (t1, mut rx1) = recorder();
    let (t2, mut rx2) = recorder();
    let a = RequestInstrumentor::builder(t1).state(Arc::clone(&state)).build();
    let b = RequestInstrumentor::builder(t2).state(Arc::clone(&state)).build();

    call(&app(&a), "/").await;
    call(&app(&b), "/status/500").await;
    recv_n(&mut rx1, 3).await;
    recv_n(&mut rx2, 3).await;

    assert_eq!(state.total_requests(), 2);
    assert_eq!(state.total_errors(), 1);
}

#[test]
fn constructor_accepts_a_valid_credential() {
    let inst = RequestInstrumentor::new(AuthCredential::api_key("k1").unwrap(), Vec::new()).unwrap();
    assert_eq!(inst.pipeline_labels(), vec!["latency", "requests_per_second", "error_rate"]);
}

#[test]
fn from_config_rejects_missing_credentials() {
    let cfg = mantis_middleware::config::schema::MantisConfig {
        version: 1,
        auth: Default::default(),
        transport: Default::default(),
        server: Default::default(),
    };
    let err = match RequestInstrumentor::from_config(&cfg, Vec::new()) {
        Ok(_) => panic!("must fail"),
        Err(e) => e,
    };
    assert_eq!(err.kind().as_str(), "CONFIGURATION");
}

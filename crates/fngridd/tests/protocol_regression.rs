//! Dispatcher/autoscaler regression tests.
//!
//! Exercises the routers in-process with `oneshot`, then wires both
//! processes together over real sockets on ephemeral ports.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fngrid_api::{DispatcherState, autoscaler_router, dispatcher_router};
use fngrid_autoscale::{Autoscaler, ScalingPolicy};
use fngrid_core::{AutoscalerStatus, DispatcherStatus, epoch_millis};
use fngrid_functions::FunctionRegistry;
use fngrid_lifecycle::{ColdStartPolicy, FunctionTable, Invoker};
use fngrid_sync::{InstanceSync, Notifier, fetch_autoscaler_status, http_get};

async fn unused_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}

/// Accepts connections and never answers them.
async fn silent_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    address
}

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    address
}

async fn dispatcher_state(autoscaler_address: &str) -> DispatcherState {
    let registry = FunctionRegistry::with_builtins().await;
    let invoker = Invoker::new(
        FunctionTable::new(1),
        registry,
        ColdStartPolicy::default(),
        Duration::from_secs(2),
    );
    invoker.sync_registry().await;
    let notifier = Notifier::new(
        autoscaler_address,
        3,
        Duration::from_millis(10),
        Duration::from_millis(200),
    );
    DispatcherState { invoker, notifier }
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn dispatcher_answers_with_autoscaler_down() {
    let router = dispatcher_router(dispatcher_state(&unused_address().await).await);

    let (status, body) = get_json(&router, "/echo?text=hello%20world").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "hello world");

    let (status, body) = get_json(&router, "/calculate?a=4&b=5&op=multiply").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], 20.0);

    let (status, body) = get_json(&router, "/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn hung_autoscaler_does_not_delay_calls() {
    let mut state = dispatcher_state(&unused_address().await).await;
    state.notifier = Notifier::new(
        silent_address().await,
        2,
        Duration::from_millis(10),
        Duration::from_secs(1),
    );
    let router = dispatcher_router(state);

    let started = std::time::Instant::now();
    let (status, body) = get_json(&router, "/echo?text=still%20here").await;
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "still here");

    let (_, body) = get_json(&router, "/status").await;
    let snapshot: DispatcherStatus = serde_json::from_value(body).unwrap();
    assert_eq!(snapshot.functions["echo"].active_requests, 0);
    assert_eq!(snapshot.functions["echo"].stats.successful_requests, 1);
}

#[tokio::test]
async fn trailing_path_segments_use_first_segment() {
    let router = dispatcher_router(dispatcher_state(&unused_address().await).await);
    let (status, body) = get_json(&router, "/echo/extra?text=hi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "hi");

    let autoscaler = Autoscaler::new(ScalingPolicy::default(), 10, 60);
    let router = autoscaler_router(autoscaler.clone());
    let (status, body) = get_json(&router, "/echo/extra").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let snapshot = autoscaler.status(epoch_millis()).await;
    assert_eq!(snapshot.calls["echo"], 1);
}

#[tokio::test]
async fn status_after_repeated_echo_calls() {
    let router = dispatcher_router(dispatcher_state(&unused_address().await).await);

    const N: u64 = 10;
    for i in 0..N {
        let (status, _) = get_json(&router, &format!("/echo?text={i}")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get_json(&router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: DispatcherStatus = serde_json::from_value(body).unwrap();
    let echo = &snapshot.functions["echo"];
    assert_eq!(echo.stats.total_requests, N);
    assert_eq!(echo.stats.successful_requests, N);
    assert_eq!(echo.stats.failed_requests, 0);
    assert!(echo.stats.avg_response_time >= 0.0);
    assert_eq!(echo.active_requests, 0);
    assert_eq!(echo.cold_starts, 0);
}

#[tokio::test]
async fn dispatcher_serves_index_metrics_and_cors() {
    let router = dispatcher_router(dispatcher_state(&unused_address().await).await);

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&html).contains("fetch('/status')"));

    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
        .uri("/status")
        .header("origin", "http://dashboard.local")
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap()),
        Some("*")
    );
}

#[tokio::test]
async fn autoscaler_acknowledges_unknown_functions() {
    let autoscaler = Autoscaler::new(ScalingPolicy::default(), 10, 60);
    let router = autoscaler_router(autoscaler.clone());

    let (status, body) = get_json(&router, "/brand-new").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "call recorded");

    let (status, body) = get_json(&router, "/status").await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: AutoscalerStatus = serde_json::from_value(body).unwrap();
    assert_eq!(snapshot.instances["brand-new"], 1);
    assert_eq!(snapshot.calls["brand-new"], 1);
}

#[tokio::test]
async fn calls_reach_autoscaler_and_counts_flow_back() {
    let autoscaler = Autoscaler::new(ScalingPolicy::default(), 10, 60);
    let autoscaler_address = serve(autoscaler_router(autoscaler.clone())).await;

    let state = dispatcher_state(&autoscaler_address).await;
    let table = state.invoker.table().clone();
    let dispatcher_address = serve(dispatcher_router(state)).await;

    const N: u64 = 60;
    for i in 0..N {
        let (status, _) = http_get(
            &dispatcher_address,
            &format!("/echo?text={i}"),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    // Notifications are detached; wait for them to land.
    let mut seen = 0;
    for _ in 0..100 {
        let snapshot = fetch_autoscaler_status(&autoscaler_address, Duration::from_secs(1))
            .await
            .unwrap();
        seen = snapshot.calls.get("echo").copied().unwrap_or(0);
        if seen == N {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(seen, N);

    // 60 calls in a 10s window is 6/s: one step up.
    let decisions = autoscaler.run_cycle(epoch_millis()).await;
    assert!(decisions.iter().any(|(f, _)| f == "echo"));
    assert_eq!(autoscaler.instances().get("echo").await, Some(2));

    let sync = InstanceSync::new(
        autoscaler_address,
        table.clone(),
        Duration::from_secs(5),
        Duration::from_secs(1),
    );
    assert_eq!(sync.sync_once().await.unwrap(), 1);
    assert_eq!(table.get("echo").await.unwrap().instances(), 2);
    // Functions the dispatcher has never called keep their local count.
    assert_eq!(table.get("weather").await.unwrap().instances(), 1);
}

// tests/service_tests.rs
use hyper::{Body, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use temperature_collector::config::Config;
use temperature_collector::server::{Server, ServerBuilder, ServerState};
use temperature_collector::{App, ServerError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tower::Service;

const STARTUP_BOUND: Duration = Duration::from_secs(2);

fn local_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".into();
    config.server.port = 0;
    config.server.shutdown_grace_secs = 2;
    config.metrics.host = "127.0.0.1".into();
    config.metrics.port = 0;
    config
}

struct Running {
    addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
    state: watch::Receiver<ServerState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), ServerError>>,
}

async fn start(config: Config) -> Running {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let app = tokio::time::timeout(STARTUP_BOUND, App::bind(&config, shutdown_rx.clone()))
        .await
        .expect("bind must not hang")
        .expect("bind on a free port");

    let addr = app.local_addr();
    let metrics_addr = app.metrics_addr();
    let state = app.state();
    let task = tokio::spawn(app.run(shutdown_rx));

    Running {
        addr,
        metrics_addr,
        state,
        shutdown,
        task,
    }
}

async fn wait_for_state(state: &mut watch::Receiver<ServerState>, wanted: ServerState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while *state.borrow_and_update() != wanted {
            state.changed().await.expect("server dropped its state channel");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("server never reached {wanted:?}"));
}

#[tokio::test]
async fn health_returns_ok_over_tcp() {
    let running = start(local_config()).await;
    assert_eq!(*running.state.borrow(), ServerState::Serving);

    let response = reqwest::get(format!("http://{}/health", running.addr))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok" }));

    running.shutdown.send(true).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn root_is_ok_and_stable_across_calls() {
    let running = start(local_config()).await;
    let client = reqwest::Client::new();
    let url = format!("http://{}/", running.addr);

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::OK);
    let first: serde_json::Value = first.json().await.unwrap();

    let second: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first["service"], "temperature-collector");
    assert_eq!(first["version"], env!("CARGO_PKG_VERSION"));
    let started_at = first["started_at"].as_str().expect("started_at");
    chrono::DateTime::parse_from_rfc3339(started_at).unwrap();

    running.shutdown.send(true).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn unknown_route_does_not_disturb_the_listener() {
    let running = start(local_config()).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("http://{}/nope", running.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

    let health = client
        .get(format!("http://{}/health", running.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);

    running.shutdown.send(true).unwrap();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn port_in_use_fails_before_serving() {
    let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = local_config();
    config.server.port = squatter.local_addr().unwrap().port();

    let (_tx, rx) = watch::channel(false);
    let err = App::bind(&config, rx).await.err().expect("bind must fail");
    assert!(err.is_addr_in_use(), "unexpected error: {err}");
}

#[tokio::test]
async fn invalid_host_is_rejected() {
    let mut config = local_config();
    config.server.host = "not-an-ip".into();

    let (_tx, rx) = watch::channel(false);
    let err = App::bind(&config, rx).await.err().expect("bind must fail");
    assert!(matches!(err, ServerError::InvalidAddress(_)));
}

#[tokio::test]
async fn shutdown_stops_serving_and_releases_the_port() {
    let mut running = start(local_config()).await;
    wait_for_state(&mut running.state, ServerState::Serving).await;

    running.shutdown.send(true).unwrap();
    wait_for_state(&mut running.state, ServerState::Stopped).await;
    tokio::time::timeout(Duration::from_secs(5), running.task)
        .await
        .expect("run must return after drain")
        .unwrap()
        .unwrap();

    // The same port can be bound again once the listener is released.
    tokio::net::TcpListener::bind(running.addr).await.unwrap();
}

#[tokio::test]
async fn metrics_listener_exposes_request_counts() {
    let mut config = local_config();
    config.metrics.enabled = true;
    let running = start(config).await;
    let metrics_addr = running.metrics_addr.expect("metrics enabled");

    reqwest::get(format!("http://{}/health", running.addr))
        .await
        .unwrap();

    let text = reqwest::get(format!("http://{}/metrics", metrics_addr))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains(r#"route="/health""#), "{text}");
    assert!(text.contains("collector_health_status 1"), "{text}");

    running.shutdown.send(true).unwrap();
    running.task.await.unwrap().unwrap();
}

/// Reports on `started` as soon as a request arrives, then answers after
/// `delay`.
#[derive(Clone)]
struct SlowHandler {
    delay: Duration,
    started: Arc<Notify>,
}

impl Service<Request<Body>> for SlowHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: Request<Body>) -> Self::Future {
        let delay = self.delay;
        let started = self.started.clone();
        Box::pin(async move {
            started.notify_one();
            tokio::time::sleep(delay).await;
            let mut response = Response::new(Body::from("done"));
            *response.status_mut() = StatusCode::OK;
            Ok(response)
        })
    }
}

async fn bind_slow_server(
    delay: Duration,
    grace_period: Duration,
    started: Arc<Notify>,
) -> Server<SlowHandler> {
    ServerBuilder::new("127.0.0.1:0".parse().unwrap())
        .with_handler(SlowHandler { delay, started })
        .with_grace_period(grace_period)
        .bind()
        .await
        .unwrap()
}

#[tokio::test]
async fn in_flight_request_finishes_during_drain() {
    let started = Arc::new(Notify::new());
    let server = bind_slow_server(
        Duration::from_millis(300),
        Duration::from_secs(5),
        started.clone(),
    )
    .await;
    let addr = server.local_addr();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let serve = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    let request = tokio::spawn(reqwest::get(format!("http://{addr}/")));
    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("handler never started");
    tx.send(()).unwrap();

    let response = request.await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "done");
    serve.await.unwrap().unwrap();
}

#[tokio::test]
async fn requests_past_the_grace_period_are_dropped() {
    let grace_period = Duration::from_millis(200);
    let started = Arc::new(Notify::new());
    let server = bind_slow_server(Duration::from_secs(30), grace_period, started.clone()).await;
    let addr = server.local_addr();
    let mut state = server.state();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let serve = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = rx.await;
    }));

    let request = tokio::spawn(reqwest::get(format!("http://{addr}/")));
    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("handler never started");
    let signalled_at = Instant::now();
    tx.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(5), serve)
        .await
        .expect("grace period must bound the drain")
        .unwrap()
        .unwrap();
    let drained_after = signalled_at.elapsed();
    assert!(
        drained_after >= grace_period,
        "server stopped after {drained_after:?}, before the grace period ran out"
    );
    assert!(
        drained_after < grace_period + Duration::from_secs(2),
        "server took {drained_after:?} to stop"
    );
    wait_for_state(&mut state, ServerState::Stopped).await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .unwrap()
        .unwrap();
    assert!(outcome.is_err(), "aborted connection must not produce a response");
}

// src/server/handler.rs
use crate::api::{self, AppState, Route};
use crate::metrics::{MetricsCollector, Timer};
use hyper::header::HeaderValue;
use hyper::{Body, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::{debug, error, Instrument};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Entry point for every request on the main listener. Route errors are
/// converted into responses here, so the service itself never fails.
#[derive(Clone)]
pub struct RequestHandler {
    state: Arc<AppState>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl RequestHandler {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let metrics = self.metrics.clone();
        let request_id = request_id(&req);
        let span = tracing::info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id.to_str().unwrap_or("-"),
        );

        Box::pin(
            async move {
                let timer = Timer::new();
                let (parts, _) = req.into_parts();
                let path = parts.uri.path();
                let route = Route::from_path(path);

                let mut response = match api::dispatch(&state, &parts.method, path).await {
                    Ok(response) => response,
                    Err(err) => {
                        if err.status().is_server_error() {
                            error!(%err, "request failed");
                        } else {
                            debug!(%err, "request rejected");
                        }
                        err.into()
                    }
                };
                response
                    .headers_mut()
                    .insert(REQUEST_ID_HEADER, request_id);

                let elapsed = timer.elapsed();
                if let Some(metrics) = &metrics {
                    metrics.record_request(
                        parts.method.as_str(),
                        Route::label(route),
                        response.status().as_u16(),
                        elapsed,
                    );
                }
                debug!(status = response.status().as_u16(), ?elapsed, "request completed");

                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Echo a sane incoming request id, otherwise mint a new one.
fn request_id(req: &Request<Body>) -> HeaderValue {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| {
            let len = value.as_bytes().len();
            len > 0 && len <= MAX_REQUEST_ID_LEN && value.to_str().is_ok()
        })
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        })
}

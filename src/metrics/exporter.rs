// src/metrics/exporter.rs
use super::MetricsRegistry;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;
use tracing::error;

/// Serves the Prometheus exposition on its own listener.
#[derive(Clone)]
pub struct MetricsHandler {
    registry: Arc<MetricsRegistry>,
    path: Arc<str>,
}

impl MetricsHandler {
    pub fn new(registry: Arc<MetricsRegistry>, path: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            path: path.into(),
        }
    }

    fn respond(&self, req: &Request<Body>) -> Response<Body> {
        if req.uri().path() != &*self.path {
            return plain(StatusCode::NOT_FOUND, "Not Found");
        }
        if req.method() != Method::GET {
            return plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
        }

        match self.registry.gather() {
            Ok(buffer) => {
                let mut response = Response::new(Body::from(buffer));
                if let Ok(content_type) = HeaderValue::from_str(&self.registry.content_type()) {
                    response.headers_mut().insert(CONTENT_TYPE, content_type);
                }
                response
            }
            Err(err) => {
                error!("Metrics encoding error: {:#}", err);
                plain(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable")
            }
        }
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}

impl Service<Request<Body>> for MetricsHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        futures::future::ready(Ok(self.respond(&req)))
    }
}

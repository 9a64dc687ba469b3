// src/api/routes.rs
use super::{AppState, RouteError};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Response, StatusCode};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Health,
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/" => Some(Route::Root),
            "/health" => Some(Route::Health),
            _ => None,
        }
    }

    /// Metric label; unknown paths collapse into `unmatched`.
    pub fn label(route: Option<Self>) -> &'static str {
        match route {
            Some(Route::Root) => "/",
            Some(Route::Health) => "/health",
            None => "unmatched",
        }
    }
}

#[derive(Debug, Serialize)]
struct ServiceInfo<'a> {
    service: &'a str,
    version: &'a str,
    started_at: String,
    message: &'a str,
}

/// Resolve and answer one request. Errors are returned to the caller which
/// turns them into a response.
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
) -> Result<Response<Body>, RouteError> {
    let route = Route::from_path(path).ok_or_else(|| RouteError::NotFound(path.to_string()))?;

    let is_head = match method {
        &Method::GET => false,
        &Method::HEAD => true,
        other => return Err(RouteError::MethodNotAllowed(other.to_string())),
    };

    let mut response = match route {
        Route::Root => root(state)?,
        Route::Health => health(state).await?,
    };

    if is_head {
        *response.body_mut() = Body::empty();
    }
    Ok(response)
}

fn root(state: &AppState) -> Result<Response<Body>, RouteError> {
    json_response(
        StatusCode::OK,
        &ServiceInfo {
            service: &state.service_name,
            version: state.version,
            started_at: state.started_at.to_rfc3339(),
            message: "temperature collector is running",
        },
    )
}

async fn health(state: &AppState) -> Result<Response<Body>, RouteError> {
    let status = state.health.evaluate().await;
    json_response(StatusCode::OK, &status)
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, RouteError> {
    let body = serde_json::to_vec(value)?;
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

// src/api/mod.rs
mod error;
mod routes;
mod state;

pub use error::RouteError;
pub use routes::{dispatch, json_response, Route};
pub use state::AppState;

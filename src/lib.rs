pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod probe;
pub mod server;

pub use app::App;
pub use error::ServerError;

pub mod builder;
pub mod handler;
pub mod listener;
pub mod shutdown;

pub use builder::{Server, ServerBuilder, ServerState};
pub use handler::{RequestHandler, REQUEST_ID_HEADER};
pub use shutdown::{shutdown_signal, wait_for_shutdown};

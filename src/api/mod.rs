//! HTTP surface — REST routes and the WebSocket event feed.

pub mod routes;
pub mod ws;

pub use routes::{AppState, task_routes};

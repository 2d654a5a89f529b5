//! HTTP API: monitor/subscriber CRUD and the delegated-report endpoint.

pub mod error;
pub mod routes;

pub use routes::AppState;

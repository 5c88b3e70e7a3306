//! HTTP transport for the CosmoWeather gateway.

pub mod app;
pub mod routes;

pub use app::App;
pub use routes::{routes, AppState};

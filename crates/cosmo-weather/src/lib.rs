//! Weather gateway core for CosmoWeather
//!
//! Resolves places through Open-Meteo geocoding, fetches forecasts, and
//! keeps both behind a short-lived in-memory cache.

pub mod cache;
pub mod client;
pub mod codes;
pub mod error;
pub mod resolver;
pub mod service;
pub mod types;

pub use cache::{TtlCache, DEFAULT_TTL};
pub use client::{ClientSettings, ForecastApi, GeocodingApi, OpenMeteoClient};
pub use error::WeatherError;
pub use resolver::LocationResolver;
pub use service::WeatherService;
pub use types::*;

//! Request orchestration: location resolution, cached forecast lookup and
//! weather-code annotation.
//!
//! Concurrent misses on the same key each call upstream; the last write
//! wins. Nothing is coalesced.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::cache::TtlCache;
use crate::client::{ForecastApi, GeocodingApi};
use crate::codes;
use crate::error::WeatherError;
use crate::resolver::LocationResolver;
use crate::types::{parse_hourly_vars, ForecastQuery, Location, Suggestion, WeatherResponse};

/// Open-Meteo never returns more geocoding candidates than this
pub const MAX_AUTOCOMPLETE_LIMIT: u32 = 100;

/// Cache key for a forecast at `location` with the given hourly variables.
///
/// Coordinates are rounded to 4 decimals and variables sorted, so requests
/// differing only in variable order share an entry.
pub fn forecast_key(location: &Location, hourly: &[String]) -> String {
    let mut vars: Vec<&str> = hourly.iter().map(String::as_str).collect();
    vars.sort_unstable();
    format!(
        "forecast:{:.4},{:.4}:{}",
        location.latitude,
        location.longitude,
        vars.join(",")
    )
}

/// Cache key for an autocomplete query.
pub fn autocomplete_key(query: &str, limit: u32) -> String {
    format!("autocomplete:{}:{}", query.to_lowercase(), limit)
}

pub struct WeatherService {
    resolver: LocationResolver,
    geocoder: Arc<dyn GeocodingApi>,
    forecaster: Arc<dyn ForecastApi>,
    cache: Arc<TtlCache<Value>>,
}

impl WeatherService {
    pub fn new(
        geocoder: Arc<dyn GeocodingApi>,
        forecaster: Arc<dyn ForecastApi>,
        cache: Arc<TtlCache<Value>>,
    ) -> Self {
        Self {
            resolver: LocationResolver::new(geocoder.clone(), cache.clone()),
            geocoder,
            forecaster,
            cache,
        }
    }

    /// Shared response cache
    pub fn cache(&self) -> &Arc<TtlCache<Value>> {
        &self.cache
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Resolve the place, then fetch and annotate its forecast.
    pub async fn weather(
        &self,
        city: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
        hourly_vars: &str,
    ) -> Result<WeatherResponse, WeatherError> {
        let location = self.resolver.resolve(city, lat, lon).await?;
        let hourly = parse_hourly_vars(hourly_vars);
        self.get_weather(location, &hourly).await
    }

    /// Forecast for an already resolved location.
    pub async fn get_weather(
        &self,
        location: Location,
        hourly: &[String],
    ) -> Result<WeatherResponse, WeatherError> {
        let forecast = self.forecast(&location, hourly).await?;

        let current = current_weather(&forecast)?.clone();
        let hourly = match forecast.get("hourly") {
            Some(h) if !h.is_null() => h.clone(),
            _ => Value::Object(Map::new()),
        };

        let (weather_desc, weather_icon) = codes::describe(current.get("weathercode"));

        Ok(WeatherResponse {
            location,
            current,
            hourly,
            weather_desc,
            weather_icon,
        })
    }

    async fn forecast(&self, location: &Location, hourly: &[String]) -> Result<Value, WeatherError> {
        let key = forecast_key(location, hourly);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "forecast cache hit");
            return Ok(cached);
        }
        debug!(key = %key, "forecast cache miss");

        let query = ForecastQuery {
            latitude: location.latitude,
            longitude: location.longitude,
            hourly: hourly.to_vec(),
        };
        let forecast = self.forecaster.forecast(&query).await?;
        current_weather(&forecast)?;
        self.cache.set(key, forecast.clone());
        Ok(forecast)
    }

    /// Geocoding candidates for a partial city name.
    pub async fn autocomplete(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Suggestion>, WeatherError> {
        if query.trim().is_empty() {
            return Err(WeatherError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(WeatherError::InvalidRequest(
                "limit must be greater than 0".to_string(),
            ));
        }
        let limit = limit.min(MAX_AUTOCOMPLETE_LIMIT);

        let key = autocomplete_key(query, limit);
        if let Some(cached) = self.cache.get(&key) {
            debug!(query, "autocomplete cache hit");
            return decode_suggestions(cached);
        }

        let response = self.geocoder.search(query, limit).await?;
        let suggestions: Vec<Suggestion> = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(Suggestion::from_geocoding).collect())
            .unwrap_or_default();

        let encoded = serde_json::to_value(&suggestions).map_err(|e| {
            WeatherError::UpstreamContractViolation(format!("Unencodable suggestions: {}", e))
        })?;
        self.cache.set(key, encoded);
        Ok(suggestions)
    }
}

fn decode_suggestions(value: Value) -> Result<Vec<Suggestion>, WeatherError> {
    serde_json::from_value(value).map_err(|e| {
        WeatherError::UpstreamContractViolation(format!("Corrupt cached suggestions: {}", e))
    })
}

/// The `current_weather` block of a forecast body, required to be non-null.
fn current_weather(forecast: &Value) -> Result<&Value, WeatherError> {
    match forecast.get("current_weather") {
        Some(current) if !current.is_null() => Ok(current),
        _ => Err(WeatherError::UpstreamContractViolation(
            "No current weather returned by upstream API".to_string(),
        )),
    }
}

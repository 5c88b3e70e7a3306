//! Turns a city name or a coordinate pair into a [`Location`].

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::TtlCache;
use crate::client::GeocodingApi;
use crate::error::WeatherError;
use crate::types::Location;

/// Cache key for the top geocoding candidate of `city`.
pub fn geocode_key(city: &str) -> String {
    format!("geocode:{}", city.to_lowercase())
}

pub struct LocationResolver {
    geocoder: Arc<dyn GeocodingApi>,
    cache: Arc<TtlCache<Value>>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn GeocodingApi>, cache: Arc<TtlCache<Value>>) -> Self {
        Self { geocoder, cache }
    }

    /// Resolve the request's place.
    ///
    /// Coordinates win when both are present and never touch the cache or the
    /// geocoder. Otherwise the city is geocoded, reusing a cached top
    /// candidate when one is live.
    pub async fn resolve(
        &self,
        city: Option<&str>,
        lat: Option<f64>,
        lon: Option<f64>,
    ) -> Result<Location, WeatherError> {
        let city = city.filter(|c| !c.is_empty());

        if let (Some(lat), Some(lon)) = (lat, lon) {
            return Ok(Location::from_coordinates(lat, lon, city));
        }

        let city = city.ok_or_else(|| {
            WeatherError::InvalidRequest("Provide either city or lat and lon".to_string())
        })?;

        self.geocode(city).await
    }

    /// Geocode `city`, caching the top candidate only once it has coordinates.
    async fn geocode(&self, city: &str) -> Result<Location, WeatherError> {
        let key = geocode_key(city);
        if let Some(cached) = self.cache.get(&key) {
            debug!(city, "geocode cache hit");
            return location_from_candidate(&cached, city);
        }
        debug!(city, "geocode cache miss");

        let response = self.geocoder.search(city, 1).await?;
        let top = response
            .get("results")
            .and_then(Value::as_array)
            .and_then(|results| results.first())
            .cloned()
            .ok_or_else(|| WeatherError::NotFound(format!("City '{}' not found", city)))?;

        let location = location_from_candidate(&top, city)?;
        self.cache.set(key, top);
        Ok(location)
    }
}

fn location_from_candidate(top: &Value, city: &str) -> Result<Location, WeatherError> {
    let coordinate = |key: &str| top.get(key).and_then(Value::as_f64);
    let (Some(latitude), Some(longitude)) = (coordinate("latitude"), coordinate("longitude"))
    else {
        return Err(WeatherError::UpstreamContractViolation(
            "Upstream geocoding did not return coordinates".to_string(),
        ));
    };

    let text = |key: &str| top.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(Location {
        name: text("name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| city.to_string()),
        latitude,
        longitude,
        country: text("country"),
        admin1: text("admin1"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Geocoder returning a canned body and recording every query
    struct StubGeocoder {
        body: Value,
        calls: Mutex<Vec<(String, u32)>>,
    }

    impl StubGeocoder {
        fn new(body: Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, u32)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl GeocodingApi for StubGeocoder {
        async fn search(&self, name: &str, count: u32) -> Result<Value, WeatherError> {
            self.calls.lock().push((name.to_string(), count));
            Ok(self.body.clone())
        }
    }

    struct FailingGeocoder;

    #[async_trait]
    impl GeocodingApi for FailingGeocoder {
        async fn search(&self, _name: &str, _count: u32) -> Result<Value, WeatherError> {
            Err(WeatherError::Upstream {
                status: Some(503),
                body: "down".into(),
            })
        }
    }

    fn london() -> Value {
        json!({"results": [{
            "name": "London",
            "country": "United Kingdom",
            "admin1": "England",
            "latitude": 51.50853,
            "longitude": -0.12574
        }]})
    }

    fn resolver(geocoder: Arc<dyn GeocodingApi>) -> (LocationResolver, Arc<TtlCache<Value>>) {
        let cache = Arc::new(TtlCache::default());
        (LocationResolver::new(geocoder, cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_coordinates_skip_geocoding() {
        let geocoder = StubGeocoder::new(london());
        let (resolver, cache) = resolver(geocoder.clone());

        let loc = resolver
            .resolve(None, Some(40.7128), Some(-74.006))
            .await
            .unwrap();

        assert_eq!(loc.latitude, 40.7128);
        assert_eq!(loc.longitude, -74.006);
        assert_eq!(loc.name, "40.713,-74.006");
        assert!(geocoder.calls().is_empty());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_coordinates_keep_city_as_name() {
        let geocoder = StubGeocoder::new(london());
        let (resolver, _) = resolver(geocoder.clone());

        let loc = resolver
            .resolve(Some("Home"), Some(1.0), Some(2.0))
            .await
            .unwrap();

        assert_eq!(loc.name, "Home");
        assert!(geocoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_is_invalid() {
        let (resolver, _) = resolver(StubGeocoder::new(london()));

        for (city, lat, lon) in [
            (None, None, None),
            (Some(""), None, None),
            (None, Some(1.0), None),
            (Some(""), None, Some(2.0)),
        ] {
            let err = resolver.resolve(city, lat, lon).await.unwrap_err();
            assert!(matches!(err, WeatherError::InvalidRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_city_with_single_coordinate_geocodes() {
        let geocoder = StubGeocoder::new(london());
        let (resolver, _) = resolver(geocoder.clone());

        let loc = resolver
            .resolve(Some("London"), Some(10.0), None)
            .await
            .unwrap();

        assert_eq!(loc.latitude, 51.50853);
        assert_eq!(geocoder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_geocode_populates_location() {
        let geocoder = StubGeocoder::new(london());
        let (resolver, _) = resolver(geocoder.clone());

        let loc = resolver.resolve(Some("LonDon"), None, None).await.unwrap();

        assert_eq!(loc.name, "London");
        assert_eq!(loc.country.as_deref(), Some("United Kingdom"));
        assert_eq!(loc.admin1.as_deref(), Some("England"));
        assert_eq!(geocoder.calls(), vec![("LonDon".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_geocode_cache_is_case_insensitive() {
        let geocoder = StubGeocoder::new(london());
        let (resolver, cache) = resolver(geocoder.clone());

        resolver.resolve(Some("London"), None, None).await.unwrap();
        resolver.resolve(Some("LONDON"), None, None).await.unwrap();

        assert_eq!(geocoder.calls().len(), 1);
        assert!(cache.get("geocode:london").is_some());
    }

    #[tokio::test]
    async fn test_no_results_is_not_found() {
        let geocoder = StubGeocoder::new(json!({"generationtime_ms": 0.5}));
        let (resolver, cache) = resolver(geocoder.clone());

        let err = resolver
            .resolve(Some("Nonexististan"), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, WeatherError::NotFound(_)));
        assert_eq!(err.to_string(), "City 'Nonexististan' not found");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_results_is_not_found() {
        let (resolver, _) = resolver(StubGeocoder::new(json!({"results": []})));
        let err = resolver.resolve(Some("Atlantis"), None, None).await.unwrap_err();
        assert!(matches!(err, WeatherError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_candidate_without_coordinates_is_contract_violation() {
        let geocoder = StubGeocoder::new(json!({"results": [{"name": "Nowhere", "latitude": 3.0}]}));
        let (resolver, _) = resolver(geocoder);

        let err = resolver.resolve(Some("Nowhere"), None, None).await.unwrap_err();

        assert!(matches!(err, WeatherError::UpstreamContractViolation(_)));
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_candidate_without_coordinates_is_not_cached() {
        let geocoder = StubGeocoder::new(json!({"results": [{"name": "Nowhere", "latitude": 3.0}]}));
        let (resolver, cache) = resolver(geocoder.clone());

        for _ in 0..2 {
            let err = resolver.resolve(Some("Nowhere"), None, None).await.unwrap_err();
            assert!(matches!(err, WeatherError::UpstreamContractViolation(_)));
        }

        assert_eq!(geocoder.calls().len(), 2);
        assert!(cache.get(&geocode_key("Nowhere")).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_nameless_candidate_falls_back_to_query() {
        let geocoder =
            StubGeocoder::new(json!({"results": [{"latitude": 3.0, "longitude": 4.0}]}));
        let (resolver, _) = resolver(geocoder);

        let loc = resolver.resolve(Some("Somewhere"), None, None).await.unwrap();
        assert_eq!(loc.name, "Somewhere");
    }

    #[tokio::test]
    async fn test_upstream_errors_are_not_cached() {
        let (resolver, cache) = resolver(Arc::new(FailingGeocoder));

        let err = resolver.resolve(Some("Paris"), None, None).await.unwrap_err();

        assert!(matches!(err, WeatherError::Upstream { status: Some(503), .. }));
        assert!(cache.is_empty());
    }
}

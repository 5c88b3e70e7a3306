//! Open-Meteo geocoding and forecast adapters.
//!
//! Both endpoints are free and keyless. Responses are decoded into generic
//! JSON; callers decide which fields they require.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ReqwestErrorExt, WeatherError};
use crate::types::ForecastQuery;

/// City-name search returning candidate locations
#[async_trait]
pub trait GeocodingApi: Send + Sync {
    /// Search for `name`, asking for at most `count` candidates.
    async fn search(&self, name: &str, count: u32) -> Result<Value, WeatherError>;
}

/// Current conditions plus hourly series for a coordinate pair
#[async_trait]
pub trait ForecastApi: Send + Sync {
    async fn forecast(&self, query: &ForecastQuery) -> Result<Value, WeatherError>;
}

/// Endpoint and transport settings for [`OpenMeteoClient`].
///
/// There are no built-in defaults here; the server fills these in from its
/// `[upstream]` config section.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    geocoding_url: String,
    forecast_url: String,
}

impl OpenMeteoClient {
    pub fn new(settings: ClientSettings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(ReqwestErrorExt::into_weather_error)?;

        Ok(Self {
            client,
            geocoding_url: settings.geocoding_url,
            forecast_url: settings.forecast_url,
        })
    }

    async fn fetch_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, WeatherError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Upstream request to {} failed: {}", url, e);
                e.into_weather_error()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Upstream {} returned status {}", url, status);
            return Err(WeatherError::upstream(Some(status.as_u16()), body));
        }

        response.json().await.map_err(|e| {
            tracing::warn!("Upstream {} sent an undecodable body: {}", url, e);
            WeatherError::upstream(Some(status.as_u16()), format!("JSON parse error: {}", e))
        })
    }
}

#[async_trait]
impl GeocodingApi for OpenMeteoClient {
    #[instrument(skip(self), level = "info")]
    async fn search(&self, name: &str, count: u32) -> Result<Value, WeatherError> {
        let params = [
            ("name", name.to_string()),
            ("count", count.to_string()),
            ("language", "en".to_string()),
            ("format", "json".to_string()),
        ];
        self.fetch_json(&self.geocoding_url, &params).await
    }
}

#[async_trait]
impl ForecastApi for OpenMeteoClient {
    #[instrument(skip(self), level = "info")]
    async fn forecast(&self, query: &ForecastQuery) -> Result<Value, WeatherError> {
        let params = query.to_params();
        self.fetch_json(&self.forecast_url, &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings_for(server: &MockServer, timeout: Duration) -> ClientSettings {
        ClientSettings {
            geocoding_url: format!("{}/v1/search", server.uri()),
            forecast_url: format!("{}/v1/forecast", server.uri()),
            timeout,
            user_agent: "cosmoweather-test".to_string(),
        }
    }

    fn client_for(server: &MockServer) -> OpenMeteoClient {
        OpenMeteoClient::new(settings_for(server, Duration::from_secs(2))).unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_expected_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "São Paulo"))
            .and(query_param("count", "1"))
            .and(query_param("language", "en"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"name": "São Paulo", "latitude": -23.55, "longitude": -46.63}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let body = client.search("São Paulo", 1).await.unwrap();

        assert_eq!(body["results"][0]["name"], "São Paulo");
    }

    #[tokio::test]
    async fn test_requests_use_configured_user_agent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(header("user-agent", "cosmoweather-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        client_for(&mock_server).search("Oslo", 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_forecast_sends_expected_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.52"))
            .and(query_param("longitude", "13.41"))
            .and(query_param("current_weather", "true"))
            .and(query_param("hourly", "temperature_2m,windspeed_10m"))
            .and(query_param("timezone", "auto"))
            .and(query_param("forecast_days", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "current_weather": {"weathercode": 1, "temperature": 20.5},
                "hourly": {"temperature_2m": [20.5, 21.0]}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let query = ForecastQuery {
            latitude: 52.52,
            longitude: 13.41,
            hourly: vec!["temperature_2m".into(), "windspeed_10m".into()],
        };
        let body = client.forecast(&query).await.unwrap();

        assert_eq!(body["current_weather"]["weathercode"], 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":true,"reason":"bad"}"#),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.search("x", 1).await.unwrap_err();

        match err {
            WeatherError::Upstream { status, body } => {
                assert_eq!(status, Some(400));
                assert!(body.contains("bad"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_upstream_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let client =
            OpenMeteoClient::new(settings_for(&mock_server, Duration::from_millis(200))).unwrap();

        let query = ForecastQuery {
            latitude: 0.0,
            longitude: 0.0,
            hourly: vec![],
        };
        let err = client.forecast(&query).await.unwrap_err();

        assert!(matches!(err, WeatherError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn test_invalid_json_is_upstream_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.search("x", 1).await.unwrap_err();

        assert!(matches!(err, WeatherError::Upstream { status: Some(200), .. }));
    }
}

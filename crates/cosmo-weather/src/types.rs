use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resolved place a forecast is requested for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub country: Option<String>,
    /// First-level administrative region (state, province)
    pub admin1: Option<String>,
}

impl Location {
    /// Location built from caller-supplied coordinates.
    pub fn from_coordinates(latitude: f64, longitude: f64, name: Option<&str>) -> Self {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("{:.3},{:.3}", latitude, longitude),
        };
        Self {
            name,
            latitude,
            longitude,
            country: None,
            admin1: None,
        }
    }
}

/// One geocoding candidate as returned to autocomplete callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: Option<String>,
    pub country: Option<String>,
    pub admin1: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Suggestion {
    /// Simplify a raw geocoding result; missing or mistyped fields become `None`.
    pub fn from_geocoding(result: &Value) -> Self {
        let text = |key: &str| result.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| result.get(key).and_then(Value::as_f64);
        Self {
            name: text("name"),
            country: text("country"),
            admin1: text("admin1"),
            latitude: number("latitude"),
            longitude: number("longitude"),
        }
    }
}

/// Combined answer for `/api/weather`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherResponse {
    pub location: Location,
    /// Current conditions exactly as the forecast provider reported them
    pub current: Value,
    /// Hourly series keyed by variable name, empty object when absent
    pub hourly: Value,
    pub weather_desc: String,
    pub weather_icon: String,
}

/// Parameters of one forecast lookup
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Hourly variables in caller order; empty means current conditions only
    pub hourly: Vec<String>,
}

impl ForecastQuery {
    /// Query string pairs sent to the forecast endpoint.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("current_weather", "true".to_string()),
        ];
        if !self.hourly.is_empty() {
            params.push(("hourly", self.hourly.join(",")));
        }
        params.push(("timezone", "auto".to_string()));
        params.push(("forecast_days", "1".to_string()));
        params
    }
}

/// Split a comma-separated variable list, trimming and dropping empty entries.
pub fn parse_hourly_vars(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

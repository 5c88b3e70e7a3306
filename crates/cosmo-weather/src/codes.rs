//! WMO weather code descriptions and icons.
//! See: https://open-meteo.com/en/docs#weathervariables

use serde_json::Value;

/// Icon used when a code is unknown or missing
pub const FALLBACK_ICON: &str = "🌈";

/// Static description/icon pair for one weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherCodeEntry {
    pub description: &'static str,
    pub icon: &'static str,
}

const fn entry(description: &'static str, icon: &'static str) -> WeatherCodeEntry {
    WeatherCodeEntry { description, icon }
}

/// Look up a WMO code in the table
pub fn lookup(code: i64) -> Option<WeatherCodeEntry> {
    let e = match code {
        0 => entry("Clear sky", "☀️"),
        1 => entry("Mainly clear", "🌤️"),
        2 => entry("Partly cloudy", "⛅"),
        3 => entry("Overcast", "☁️"),
        45 => entry("Fog", "🌫️"),
        48 => entry("Depositing rime fog", "🌫️"),
        51 => entry("Light drizzle", "🌦️"),
        53 => entry("Moderate drizzle", "🌦️"),
        55 => entry("Dense drizzle", "🌧️"),
        61 => entry("Slight rain", "🌧️"),
        63 => entry("Moderate rain", "🌧️"),
        65 => entry("Heavy rain", "⛈️"),
        71 => entry("Slight snow", "🌨️"),
        73 => entry("Moderate snow", "🌨️"),
        75 => entry("Heavy snow", "❄️"),
        80 => entry("Rain showers", "🌧️"),
        95 => entry("Thunderstorm", "⛈️"),
        _ => return None,
    };
    Some(e)
}

/// Integral value of a JSON code, accepting `3` and `3.0` alike.
fn as_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Description and icon for the `weathercode` field of current conditions.
///
/// Known codes use the table; a present but unknown code yields
/// `"Weather code {code}"`; a missing or null code yields an empty description.
/// Both fallbacks carry [`FALLBACK_ICON`].
pub fn describe(code: Option<&Value>) -> (String, String) {
    let code = match code {
        None | Some(Value::Null) => return (String::new(), FALLBACK_ICON.to_string()),
        Some(c) => c,
    };

    if let Some(e) = as_code(code).and_then(lookup) {
        return (e.description.to_string(), e.icon.to_string());
    }

    let shown = match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (format!("Weather code {}", shown), FALLBACK_ICON.to_string())
}

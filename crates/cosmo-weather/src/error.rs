//! Request-level error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Caller input is malformed or insufficient.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Geocoding returned no match.
    #[error("{0}")]
    NotFound(String),

    /// Network failure, timeout or non-success status from a provider.
    #[error("Upstream error{}: {body}", status_suffix(.status))]
    Upstream { status: Option<u16>, body: String },

    /// Provider answered successfully but the payload lacks required fields.
    #[error("{0}")]
    UpstreamContractViolation(String),
}

impl WeatherError {
    /// HTTP status the transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::NotFound(_) => 404,
            Self::Upstream { .. } | Self::UpstreamContractViolation(_) => 502,
        }
    }

    /// User-facing detail for the response body.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => msg.clone(),
            Self::NotFound(msg) => msg.clone(),
            Self::Upstream { status: Some(s), .. } => {
                format!("Upstream weather service returned status {}", s)
            }
            Self::Upstream { status: None, .. } => {
                "Upstream weather service is unreachable".to_string()
            }
            Self::UpstreamContractViolation(msg) => msg.clone(),
        }
    }

    pub(crate) fn upstream(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_weather_error(self) -> WeatherError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_weather_error(self) -> WeatherError {
        if self.is_timeout() {
            WeatherError::upstream(None, "request timed out")
        } else if let Some(status) = self.status() {
            WeatherError::upstream(Some(status.as_u16()), self.to_string())
        } else {
            WeatherError::upstream(None, self.to_string())
        }
    }
}

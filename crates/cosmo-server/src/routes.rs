//! warp filters and handlers for the public API.

use std::collections::HashMap;
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use cosmo_core::WeatherDefaults;
use cosmo_weather::{WeatherError, WeatherService};
use serde::Serialize;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// State shared by every request handler
pub struct AppState {
    pub service: WeatherService,
    pub defaults: WeatherDefaults,
}

/// Request failure carried through warp's rejection system
#[derive(Debug)]
pub struct ApiError(pub WeatherError);

impl warp::reject::Reject for ApiError {}

impl From<WeatherError> for ApiError {
    fn from(e: WeatherError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

type Params = HashMap<String, String>;

/// All API routes with error recovery applied.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let autocomplete = warp::get()
        .and(warp::path!("api" / "autocomplete"))
        .and(warp::query::<Params>())
        .and(with_state(state.clone()))
        .and_then(autocomplete_handler);

    let weather = warp::get()
        .and(warp::path!("api" / "weather"))
        .and(warp::query::<Params>())
        .and(with_state(state.clone()))
        .and_then(weather_handler);

    let health = warp::get()
        .and(warp::path!("health"))
        .and(with_state(state))
        .map(health_handler);

    autocomplete
        .or(weather)
        .or(health)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Parse an optional query parameter; an unparseable value is a 400.
fn parse_param<T: FromStr>(params: &Params, name: &str) -> Result<Option<T>, ApiError> {
    match params.get(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ApiError(WeatherError::InvalidRequest(format!(
                "Invalid value for {}: {:?}",
                name, raw
            )))
        }),
    }
}

async fn autocomplete_handler(
    params: Params,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let query = params.get("query").map(String::as_str).unwrap_or_default();
    let limit = parse_param::<u32>(&params, "limit")
        .map_err(warp::reject::custom)?
        .unwrap_or(state.defaults.default_autocomplete_limit);

    let suggestions = state
        .service
        .autocomplete(query, limit)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    Ok(warp::reply::json(&suggestions))
}

async fn weather_handler(
    params: Params,
    state: Arc<AppState>,
) -> Result<impl Reply, Rejection> {
    let city = params.get("city").map(String::as_str);
    let lat = parse_param::<f64>(&params, "lat").map_err(warp::reject::custom)?;
    let lon = parse_param::<f64>(&params, "lon").map_err(warp::reject::custom)?;
    let hourly_vars = params
        .get("hourly_vars")
        .map(String::as_str)
        .unwrap_or(state.defaults.default_hourly_vars.as_str());

    let response = state
        .service
        .weather(city, lat, lon, hourly_vars)
        .await
        .map_err(|e| warp::reject::custom(ApiError::from(e)))?;

    Ok(warp::reply::json(&response))
}

fn health_handler(state: Arc<AppState>) -> impl Reply {
    warp::reply::json(&serde_json::json!({
        "status": "ok",
        "cache_entries": state.service.cache().len(),
    }))
}

/// Map rejections to `{"detail": ...}` bodies with a matching status.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if let Some(ApiError(e)) = err.find::<ApiError>() {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", e);
        } else {
            tracing::debug!("Request rejected: {}", e);
        }
        (status, e.user_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method Not Allowed".to_string(),
        )
    } else {
        tracing::error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorBody { detail }),
        status,
    ))
}

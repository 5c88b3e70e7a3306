use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cosmo_core::Config;
use cosmo_weather::{
    ClientSettings, ForecastApi, GeocodingApi, OpenMeteoClient, TtlCache, WeatherService,
};

use crate::routes::{self, AppState};

/// Gateway state and lifecycle manager.
///
/// The response cache is created here, lives as long as the process, and is
/// never persisted.
pub struct App {
    config: Arc<Config>,
    state: Arc<AppState>,
}

impl App {
    /// Create an application talking to the configured Open-Meteo endpoints
    pub fn new(config: Config) -> Result<Self> {
        let client = OpenMeteoClient::new(ClientSettings {
            geocoding_url: config.upstream.geocoding_url.clone(),
            forecast_url: config.upstream.forecast_url.clone(),
            timeout: Duration::from_secs(config.upstream.timeout_secs),
            user_agent: config.upstream.user_agent.clone(),
        })
        .context("Failed to create HTTP client")?;
        let client = Arc::new(client);

        Ok(Self::with_clients(config, client.clone(), client))
    }

    /// Create an application with explicit upstream adapters
    pub fn with_clients(
        config: Config,
        geocoder: Arc<dyn GeocodingApi>,
        forecaster: Arc<dyn ForecastApi>,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(config.cache.ttl_secs)));
        let state = Arc::new(AppState {
            service: WeatherService::new(geocoder, forecaster, cache),
            defaults: config.weather.clone(),
        });

        Self {
            config: Arc::new(config),
            state,
        }
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Serve the API until `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .config
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.config.server.bind))?;

        let sweeper = self.spawn_sweeper();

        let (bound, server) = warp::serve(routes::routes(self.state.clone()))
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .with_context(|| format!("Failed to bind {}", addr))?;

        tracing::info!("CosmoWeather listening on http://{}", bound);
        server.await;

        if let Some(handle) = sweeper {
            handle.abort();
        }
        tracing::info!("Shutting down application");
        Ok(())
    }

    /// Periodically drop expired cache entries so unrequested keys do not linger.
    fn spawn_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        let secs = self.config.server.cache_sweep_secs;
        if secs == 0 {
            return None;
        }

        let state = self.state.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                let purged = state.service.cache().purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "swept expired cache entries");
                }
            }
        }))
    }
}

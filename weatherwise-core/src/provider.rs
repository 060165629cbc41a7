use crate::{
    Config, CurrentConditions, FetchError, ForecastDay, Units,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, time::Duration};

pub mod openweather;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Keys shipped in sample configs and READMEs; never valid.
const PLACEHOLDER_KEYS: &[&str] = &[
    "your_api_key",
    "your_api_key_here",
    "replace_with_your_api_key",
    "<api_key>",
    "changeme",
];

/// Everything a provider needs at construction time.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: String,
    pub units: Units,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>, units: Units) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: openweather::DEFAULT_BASE_URL.to_string(),
            units,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Source of current conditions and forecasts for a free-text location.
///
/// Implementations report every failure through [`FetchError`] scoped to the
/// location and endpoint; they never panic on bad responses.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_current(&self, location: &str) -> Result<CurrentConditions, FetchError>;

    async fn fetch_forecast(&self, location: &str) -> Result<Vec<ForecastDay>, FetchError>;
}

/// Reject empty and placeholder keys before any request goes out.
pub fn validate_api_key(api_key: &str) -> Result<(), FetchError> {
    let trimmed = api_key.trim();

    if trimmed.is_empty() {
        return Err(FetchError::credential("no API key configured"));
    }

    let lower = trimmed.to_lowercase();
    if PLACEHOLDER_KEYS.contains(&lower.as_str()) {
        return Err(FetchError::credential(format!(
            "'{trimmed}' is a placeholder, not a real API key"
        )));
    }

    Ok(())
}

/// Construct the OpenWeatherMap provider from config, overriding the configured units.
pub fn provider_from_config(
    config: &Config,
    units: Units,
) -> Result<Box<dyn WeatherProvider>, FetchError> {
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let mut settings = ProviderSettings::new(api_key, units);
    settings.timeout = config.timeout();
    if let Some(base_url) = &config.base_url {
        settings.base_url = base_url.clone();
    }

    Ok(Box::new(OpenWeatherProvider::new(settings)?))
}

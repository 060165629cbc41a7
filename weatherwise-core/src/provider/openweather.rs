use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Timelike, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

use crate::{
    error::{Endpoint, FetchError},
    model::{CurrentConditions, ForecastDay, Units},
};

use super::{ProviderSettings, WeatherProvider, validate_api_key};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// The forecast endpoint returns 3-hourly entries; every 8th one is taken as a day.
///
/// NOTE: this stride ignores calendar-day boundaries and the series cadence. It is
/// kept for output compatibility but breaks if the provider changes its cadence.
const FORECAST_STRIDE: usize = 8;
/// Entries past this index are never sampled, so at most 3 days come back.
const FORECAST_WINDOW: usize = 24;

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    units: Units,
    http: Client,
}

impl OpenWeatherProvider {
    /// Validates the API key locally and builds a client with the configured
    /// timeout. No request is made here.
    pub fn new(settings: ProviderSettings) -> Result<Self, FetchError> {
        validate_api_key(&settings.api_key)?;

        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| FetchError::Setup {
                message: e.to_string(),
            })?;

        Ok(Self {
            api_key: settings.api_key.trim().to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            units: settings.units,
            http,
        })
    }

    pub fn units(&self) -> Units {
        self.units
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        location: &str,
    ) -> Result<T, FetchError> {
        let path = match endpoint {
            Endpoint::Current => "weather",
            Endpoint::Forecast => "forecast",
        };
        let url = format!("{}/{path}", self.base_url);
        debug!(%url, "sending request");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", location),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(location, endpoint, e))?;

        let status = res.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(location, %endpoint, "API key rejected");
            return Err(FetchError::Unauthorized {
                location: location.to_string(),
                endpoint,
            });
        }

        let body = res
            .text()
            .await
            .map_err(|e| transport_error(location, endpoint, e))?;

        if !status.is_success() {
            return Err(FetchError::Provider {
                location: location.to_string(),
                endpoint,
                message: format!("request failed with status {status}: {}", truncate_body(&body)),
            });
        }

        serde_json::from_str(&body).map_err(|e| FetchError::Provider {
            location: location.to_string(),
            endpoint,
            message: format!("malformed response: {e}"),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), fields(units = %self.units))]
    async fn fetch_current(&self, location: &str) -> Result<CurrentConditions, FetchError> {
        let parsed: OwCurrentResponse = self.get_json(Endpoint::Current, location).await?;

        let condition = first_description(&parsed.weather).ok_or_else(|| FetchError::Provider {
            location: location.to_string(),
            endpoint: Endpoint::Current,
            message: "response contained no weather description".to_string(),
        })?;

        let local_time =
            local_time(Utc::now(), parsed.timezone).ok_or_else(|| FetchError::Provider {
                location: location.to_string(),
                endpoint: Endpoint::Current,
                message: format!("timezone offset {} is out of range", parsed.timezone),
            })?;

        Ok(CurrentConditions {
            location_name: parsed.name,
            temperature: parsed.main.temp,
            units: self.units,
            humidity_pct: parsed.main.humidity,
            condition,
            wind_speed: parsed.wind.speed,
            local_time,
        })
    }

    #[instrument(skip(self), fields(units = %self.units))]
    async fn fetch_forecast(&self, location: &str) -> Result<Vec<ForecastDay>, FetchError> {
        let parsed: OwForecastResponse = self.get_json(Endpoint::Forecast, location).await?;

        sample_forecast(&parsed.list).map_err(|message| FetchError::Provider {
            location: location.to_string(),
            endpoint: Endpoint::Forecast,
            message,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    /// Shift from UTC in seconds.
    timezone: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    list: Vec<OwForecastEntry>,
}

fn sample_forecast(entries: &[OwForecastEntry]) -> Result<Vec<ForecastDay>, String> {
    entries
        .iter()
        .take(FORECAST_WINDOW)
        .step_by(FORECAST_STRIDE)
        .map(|entry| {
            let date = DateTime::from_timestamp(entry.dt, 0)
                .ok_or_else(|| format!("invalid forecast timestamp {}", entry.dt))?
                .date_naive();

            let condition = first_description(&entry.weather)
                .ok_or_else(|| format!("forecast entry {} has no weather description", entry.dt))?;

            Ok(ForecastDay {
                date,
                temperature: entry.main.temp,
                condition,
            })
        })
        .collect()
}

fn first_description(weather: &[OwWeather]) -> Option<String> {
    weather.first().map(|w| w.description.clone())
}

/// Wall-clock time at a location `offset_secs` away from UTC, truncated to the minute.
///
/// `None` when the offset cannot be represented.
fn local_time(now: DateTime<Utc>, offset_secs: i64) -> Option<NaiveDateTime> {
    let shifted = now
        .checked_add_signed(TimeDelta::try_seconds(offset_secs)?)?
        .naive_utc();
    Some(
        shifted
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(shifted),
    )
}

fn transport_error(location: &str, endpoint: Endpoint, err: reqwest::Error) -> FetchError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        // The URL carries the API key.
        err.without_url().to_string()
    };

    warn!(location, %endpoint, %message, "request failed");

    FetchError::Transport {
        location: location.to_string(),
        endpoint,
        message,
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn entry(dt: i64, temp: f64, description: &str) -> OwForecastEntry {
        OwForecastEntry {
            dt,
            main: OwForecastMain { temp },
            weather: vec![OwWeather {
                description: description.to_string(),
            }],
        }
    }

    fn series(len: usize) -> Vec<OwForecastEntry> {
        // 2025-10-15T00:00:00Z, then 3-hourly.
        let start = 1_760_486_400;
        (0..len)
            .map(|i| entry(start + i as i64 * 3 * 3600, i as f64, &format!("entry {i}")))
            .collect()
    }

    #[test]
    fn sampling_takes_every_eighth_entry() {
        let days = sample_forecast(&series(24)).unwrap();

        let dates: Vec<_> = days.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2025, 10, 15).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 16).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
            ]
        );
        assert_eq!(days[1].condition, "entry 8");
        assert_eq!(days[2].temperature, 16.0);
    }

    #[test]
    fn sampling_never_looks_past_the_window() {
        let days = sample_forecast(&series(40)).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days.last().unwrap().condition, "entry 16");
    }

    #[test]
    fn sampling_short_series() {
        assert_eq!(sample_forecast(&series(9)).unwrap().len(), 2);
        assert!(sample_forecast(&[]).unwrap().is_empty());
    }

    #[test]
    fn sampling_rejects_entry_without_description() {
        let mut entries = series(1);
        entries[0].weather.clear();
        assert!(sample_forecast(&entries).is_err());
    }

    #[test]
    fn local_time_applies_offset_and_truncates() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 23, 30, 59).unwrap();

        let tokyo = local_time(now, 9 * 3600).unwrap();
        assert_eq!(tokyo.format("%Y-%m-%d %H:%M").to_string(), "2025-10-15 08:30");
        assert_eq!(tokyo.second(), 0);

        let new_york = local_time(now, -4 * 3600).unwrap();
        assert_eq!(new_york.format("%Y-%m-%d %H:%M").to_string(), "2025-10-14 19:30");
    }

    #[test]
    fn local_time_rejects_unrepresentable_offsets() {
        let now = Utc.with_ymd_and_hms(2025, 10, 14, 23, 30, 59).unwrap();

        assert_eq!(local_time(now, i64::MAX), None);
        assert_eq!(local_time(now, 9_000_000_000_000_000_000), None);
        // Representable as a delta, but past the end of the calendar.
        assert_eq!(local_time(now, 9_000_000_000_000_000), None);
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(300);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn new_rejects_placeholder_key() {
        let settings = ProviderSettings::new("your_api_key_here", Units::Metric);
        let err = OpenWeatherProvider::new(settings).unwrap_err();
        assert!(matches!(err, FetchError::Credential { .. }));
    }
}

//! Merging of per-location fetch outcomes and alert derivation.

use tracing::{info, warn};

use crate::{
    error::FetchError,
    fetch::{LocationOutcome, Progress, fetch_batch},
    model::{Alert, ForecastDay, LocationResult},
    provider::WeatherProvider,
};

/// Conditions worth warning about. Matched as case-insensitive substrings.
pub const ALERT_KEYWORDS: &[&str] = &["rain", "storm", "snow", "high wind"];

/// Outcome of a whole batch: the locations that could be shown, in request
/// order, plus every recovered failure.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<LocationResult>,
    pub problems: Vec<FetchError>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// One alert per forecast day whose condition mentions an alert keyword.
pub fn check_alerts(forecast: &[ForecastDay]) -> Vec<Alert> {
    forecast
        .iter()
        .filter(|day| {
            let condition = day.condition.to_lowercase();
            ALERT_KEYWORDS.iter().any(|kw| condition.contains(kw))
        })
        .map(|day| Alert {
            date: day.date,
            message: format!(
                "{} expected on {}",
                capitalize(&day.condition),
                day.date.format("%Y-%m-%d")
            ),
        })
        .collect()
}

/// Join both endpoint results per location.
///
/// Locations without current conditions are left out of `results`; their errors,
/// like failed forecasts, end up in `problems`.
pub fn aggregate(outcomes: Vec<LocationOutcome>) -> BatchReport {
    let mut report = BatchReport::default();

    for outcome in outcomes {
        let current = match outcome.current {
            Ok(current) => current,
            Err(err) => {
                warn!(location = %outcome.location, error = %err, "dropping location");
                report.problems.push(err);
                // The forecast is useless without current conditions.
                if let Err(forecast_err) = outcome.forecast {
                    report.problems.push(forecast_err);
                }
                continue;
            }
        };

        let forecast = outcome.forecast.unwrap_or_else(|err| {
            warn!(location = %outcome.location, error = %err, "forecast unavailable");
            report.problems.push(err);
            Vec::new()
        });

        let alerts = check_alerts(&forecast);

        report.results.push(LocationResult {
            location: outcome.location,
            current,
            forecast,
            alerts,
        });
    }

    report
}

/// Fetch and aggregate a batch of locations.
pub async fn lookup(
    provider: &dyn WeatherProvider,
    locations: &[String],
    progress: &Progress<'_>,
) -> BatchReport {
    let outcomes = fetch_batch(provider, locations, progress).await;
    let report = aggregate(outcomes);

    info!(
        requested = locations.len(),
        succeeded = report.results.len(),
        problems = report.problems.len(),
        "batch finished"
    );

    report
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Endpoint;
    use crate::model::{CurrentConditions, Units};
    use chrono::NaiveDate;

    fn day(date: &str, condition: &str) -> ForecastDay {
        ForecastDay {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            temperature: 10.0,
            condition: condition.to_string(),
        }
    }

    fn current(name: &str) -> CurrentConditions {
        CurrentConditions {
            location_name: name.to_string(),
            temperature: 12.0,
            units: Units::Metric,
            humidity_pct: 80,
            condition: "overcast clouds".to_string(),
            wind_speed: 3.5,
            local_time: NaiveDate::from_ymd_opt(2025, 10, 14)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        }
    }

    fn transport(location: &str, endpoint: Endpoint) -> FetchError {
        FetchError::Transport {
            location: location.to_string(),
            endpoint,
            message: "request timed out".to_string(),
        }
    }

    #[test]
    fn light_rain_produces_one_alert() {
        let alerts = check_alerts(&[day("2025-10-15", "light rain")]);

        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].message.to_lowercase().contains("rain"));
        assert!(alerts[0].message.contains("2025-10-15"));
        assert!(alerts[0].message.starts_with("Light rain"));
    }

    #[test]
    fn keywords_match_as_case_insensitive_substrings() {
        let forecast = [
            day("2025-10-15", "Light Rain Showers"),
            day("2025-10-16", "thunderstorm"),
            day("2025-10-17", "HEAVY SNOW"),
            day("2025-10-18", "high winds"),
            day("2025-10-19", "clear sky"),
        ];

        let alerts = check_alerts(&forecast);
        let dates: Vec<_> = alerts.iter().map(|a| a.date.to_string()).collect();
        assert_eq!(dates, ["2025-10-15", "2025-10-16", "2025-10-17", "2025-10-18"]);
    }

    #[test]
    fn alert_generation_is_idempotent() {
        let forecast = [day("2025-10-15", "rain"), day("2025-10-16", "snow")];
        assert_eq!(check_alerts(&forecast), check_alerts(&forecast));
        assert!(check_alerts(&[]).is_empty());
    }

    #[test]
    fn failed_primary_is_dropped_and_reported() {
        let outcomes = vec![
            LocationOutcome {
                location: "London".into(),
                current: Ok(current("London")),
                forecast: Ok(vec![day("2025-10-15", "rain")]),
            },
            LocationOutcome {
                location: "Atlantis".into(),
                current: Err(FetchError::Unauthorized {
                    location: "Atlantis".into(),
                    endpoint: Endpoint::Current,
                }),
                forecast: Ok(vec![day("2025-10-15", "rain")]),
            },
            LocationOutcome {
                location: "Paris".into(),
                current: Ok(current("Paris")),
                forecast: Err(transport("Paris", Endpoint::Forecast)),
            },
        ];

        let report = aggregate(outcomes);

        let names: Vec<_> = report.results.iter().map(|r| r.location.as_str()).collect();
        assert_eq!(names, ["London", "Paris"]);
        assert_eq!(report.results[0].alerts.len(), 1);
        assert!(report.results[1].forecast.is_empty());
        assert!(report.results[1].alerts.is_empty());

        assert_eq!(report.problems.len(), 2);
        assert!(report.problems[0].is_unauthorized());
        assert!(matches!(report.problems[1], FetchError::Transport { .. }));
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("éclair"), "Éclair");
    }
}

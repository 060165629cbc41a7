use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Unit system sent to the provider; decides how temperatures and wind speeds are tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_suffix(&self) -> &'static str {
        match self {
            Units::Metric => "m/s",
            Units::Imperial => "mph",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial."
            )),
        }
    }
}

/// Point-in-time snapshot returned by the "current" endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub location_name: String,
    pub temperature: f64,
    pub units: Units,
    pub humidity_pct: u8,
    pub condition: String,
    pub wind_speed: f64,
    /// Wall-clock time at the location, minute precision.
    pub local_time: NaiveDateTime,
}

impl CurrentConditions {
    pub fn format_temperature(&self) -> String {
        format!("{:.1}{}", self.temperature, self.units.temperature_suffix())
    }

    pub fn format_wind(&self) -> String {
        format!("{:.1} {}", self.wind_speed, self.units.wind_suffix())
    }

    pub fn format_local_time(&self) -> String {
        self.local_time.format(LOCAL_TIME_FORMAT).to_string()
    }
}

pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature: f64,
    pub condition: String,
}

/// Warning derived from a forecast day whose condition matched an alert keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub date: NaiveDate,
    pub message: String,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Aggregated weather for one location. Only built when the current conditions were fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    pub location: String,
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
    pub alerts: Vec<Alert>,
}

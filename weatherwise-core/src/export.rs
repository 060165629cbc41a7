use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::{fmt, fs, path::Path, str::FromStr};

use crate::model::LocationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(anyhow!("Unknown export format '{value}'. Supported: csv, json.")),
        }
    }
}

/// One CSV line: either the current observation or one forecast day.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    location: &'a str,
    kind: &'static str,
    time: String,
    temperature: f64,
    units: &'static str,
    humidity: Option<u8>,
    wind_speed: Option<f64>,
    condition: &'a str,
}

fn csv_rows(results: &[LocationResult]) -> impl Iterator<Item = CsvRow<'_>> {
    results.iter().flat_map(|result| {
        let units = result.current.units.as_str();

        let current = CsvRow {
            location: &result.current.location_name,
            kind: "current",
            time: result.current.format_local_time(),
            temperature: result.current.temperature,
            units,
            humidity: Some(result.current.humidity_pct),
            wind_speed: Some(result.current.wind_speed),
            condition: &result.current.condition,
        };

        let forecast = result.forecast.iter().map(move |day| CsvRow {
            location: &result.current.location_name,
            kind: "forecast",
            time: day.date.format("%Y-%m-%d").to_string(),
            temperature: day.temperature,
            units,
            humidity: None,
            wind_speed: None,
            condition: &day.condition,
        });

        std::iter::once(current).chain(forecast)
    })
}

/// Write results to `path`. Overwrites an existing file.
pub fn export(results: &[LocationResult], format: ExportFormat, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create export directory: {}", parent.display())
        })?;
    }

    match format {
        ExportFormat::Json => {
            let json = serde_json::to_string_pretty(results)
                .context("Failed to serialize results to JSON")?;
            fs::write(path, json)
                .with_context(|| format!("Failed to write export file: {}", path.display()))?;
        }
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("Failed to create export file: {}", path.display()))?;
            for row in csv_rows(results) {
                writer.serialize(row).context("Failed to write CSV row")?;
            }
            writer
                .flush()
                .with_context(|| format!("Failed to write export file: {}", path.display()))?;
        }
    }

    tracing::info!(path = %path.display(), %format, count = results.len(), "exported results");
    Ok(())
}

//! Terminal output: tables, alert and problem lines, forecast chart.

use colored::Colorize;
use tabled::{Table, Tabled, settings::Style};
use weatherwise_core::{FetchError, LocationResult};

const CHART_WIDTH: usize = 30;

/// Current-conditions display row.
#[derive(Tabled)]
struct CurrentRow {
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Local time")]
    local_time: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Humidity")]
    humidity: String,
    #[tabled(rename = "Wind")]
    wind: String,
    #[tabled(rename = "Condition")]
    condition: String,
}

/// Forecast display row.
#[derive(Tabled)]
struct ForecastRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Temp")]
    temperature: String,
    #[tabled(rename = "Condition")]
    condition: String,
}

pub fn current_table(results: &[LocationResult]) -> String {
    let rows = results.iter().map(|r| CurrentRow {
        location: r.current.location_name.clone(),
        local_time: r.current.format_local_time(),
        temperature: r.current.format_temperature(),
        humidity: format!("{}%", r.current.humidity_pct),
        wind: r.current.format_wind(),
        condition: r.current.condition.clone(),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn forecast_table(result: &LocationResult) -> String {
    let suffix = result.current.units.temperature_suffix();
    let rows = result.forecast.iter().map(|day| ForecastRow {
        date: day.date.format("%a %Y-%m-%d").to_string(),
        temperature: format!("{:.1}{suffix}", day.temperature),
        condition: day.condition.clone(),
    });

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Full block for one location: heading, forecast table, alerts.
pub fn location_section(result: &LocationResult) -> String {
    let heading = format!("3-day forecast: {}", result.current.location_name);
    let mut out = format!("{}\n", heading.bold());

    if result.forecast.is_empty() {
        out.push_str(&"Forecast unavailable.".dimmed().to_string());
    } else {
        out.push_str(&forecast_table(result));
    }

    for alert in &result.alerts {
        out.push('\n');
        out.push_str(&format!("⚠ {alert}").yellow().to_string());
    }

    out
}

pub fn problem_line(problem: &FetchError) -> String {
    let text = match problem {
        FetchError::Unauthorized { location, .. } => format!(
            "✗ {location}: the API key was rejected (401 Unauthorized). \
             Check it with `weatherwise configure`."
        ),
        other => format!("✗ {other}"),
    };
    text.red().to_string()
}

/// Horizontal bar chart of forecast temperatures.
pub fn temperature_chart(result: &LocationResult) -> String {
    let suffix = result.current.units.temperature_suffix();
    let mut out = format!("Temperature trend: {}", result.current.location_name);

    if result.forecast.is_empty() {
        out.push_str("\n  (no forecast data)");
        return out;
    }

    let floor = result
        .forecast
        .iter()
        .map(|d| d.temperature)
        .fold(0.0_f64, f64::min);
    let ceiling = result
        .forecast
        .iter()
        .map(|d| d.temperature)
        .fold(f64::MIN, f64::max);
    let span = ceiling - floor;

    for day in &result.forecast {
        let len = if span > 0.0 {
            (((day.temperature - floor) / span) * CHART_WIDTH as f64).round() as usize
        } else {
            CHART_WIDTH
        };
        let len = len.clamp(1, CHART_WIDTH);
        // Pad by hand: colored strings ignore format width.
        out.push_str(&format!(
            "\n  {} | {}{} {:.1}{suffix}",
            day.date.format("%m-%d"),
            "█".repeat(len).cyan(),
            " ".repeat(CHART_WIDTH - len),
            day.temperature,
        ));
    }

    out
}

use anyhow::{Context, bail};
use clap::{ArgAction, CommandFactory, FromArgMatches, Parser, Subcommand, parser::ValueSource};
use colored::Colorize;
use inquire::{Password, PasswordDisplayMode, Select, Text};
use std::{ffi::OsString, path::PathBuf};
use tracing::warn;
use weatherwise_core::{
    Config, Endpoint, ExportFormat, FetchError, Progress, SearchHistory, Units, export, lookup,
    provider::{provider_from_config, validate_api_key},
};

use crate::{progress::FetchProgressBar, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weatherwise",
    version,
    about = "Current weather and a 3-day forecast in your terminal"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// OpenWeatherMap API key; overrides the configured one.
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Set when `--api-key` was typed rather than taken from the environment.
    #[arg(skip)]
    pub api_key_from_flag: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show current conditions and forecast for one or more locations.
    Show {
        /// Location names; falls back to the configured default location.
        locations: Vec<String>,

        /// Unit system for this lookup.
        #[arg(short, long)]
        units: Option<Units>,

        /// Export results in this format (csv or json).
        #[arg(short, long)]
        export: Option<ExportFormat>,

        /// Export file; the format is inferred from its extension when --export is absent.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Draw a temperature chart of the forecast.
        #[arg(long)]
        graph: bool,
    },

    /// Set the API key, default location and units. Prompts when no flag is given.
    Configure {
        /// OpenWeatherMap API key to store.
        #[arg(long)]
        key: Option<String>,

        /// Location used when `show` gets none.
        #[arg(long)]
        default_location: Option<String>,

        /// Default unit system.
        #[arg(long)]
        units: Option<Units>,
    },

    /// List recent searches.
    History {
        /// Forget all recent searches.
        #[arg(long)]
        clear: bool,
    },
}

impl Cli {
    /// Parse arguments, remembering where `--api-key` came from.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut matches = Self::command().try_get_matches_from(args)?;

        let from_command_line = |m: &clap::ArgMatches| {
            m.value_source("api_key") == Some(ValueSource::CommandLine)
        };
        let api_key_from_flag = from_command_line(&matches)
            || matches
                .subcommand()
                .is_some_and(|(_, sub)| from_command_line(sub));

        let mut cli = Self::from_arg_matches_mut(&mut matches)?;
        cli.api_key_from_flag = api_key_from_flag;
        Ok(cli)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let Cli {
            api_key,
            api_key_from_flag,
            command,
            ..
        } = self;

        match command {
            Command::Show {
                locations,
                units,
                export,
                output,
                graph,
            } => {
                let config = Config::load()?.with_api_key_override(api_key);
                let target = resolve_export(export, output)?;
                show(&config, locations, units, target, graph).await
            }
            Command::Configure {
                key,
                default_location,
                units,
            } => {
                // `configure --api-key K` stores K; a key from the environment does not.
                let key = key.or(api_key.filter(|_| api_key_from_flag));
                configure(key, default_location, units)
            }
            Command::History { clear } => history(clear),
        }
    }
}

async fn show(
    config: &Config,
    locations: Vec<String>,
    units: Option<Units>,
    export_target: Option<(ExportFormat, PathBuf)>,
    graph: bool,
) -> anyhow::Result<()> {
    let locations = resolve_locations(locations, config.default_location.as_deref())?;
    let units = units.unwrap_or(config.units);

    // Fails before any request when the key is missing or a placeholder.
    let provider = provider_from_config(config, units)?;

    let bar = FetchProgressBar::new(locations.len() * 2);
    let progress = Progress::for_locations(locations.len()).with_observer(&bar);
    let report = lookup(provider.as_ref(), &locations, &progress).await;
    bar.finish();

    record_history(&locations);

    for problem in notices(&report.problems) {
        eprintln!("{}", render::problem_line(problem));
    }

    if report.is_empty() {
        bail!("No weather data could be retrieved for: {}", locations.join(", "));
    }

    println!("{}", "Current conditions".bold());
    println!("{}", render::current_table(&report.results));

    for result in &report.results {
        println!();
        println!("{}", render::location_section(result));
        if graph {
            println!();
            println!("{}", render::temperature_chart(result));
        }
    }

    if let Some((format, path)) = export_target {
        export(&report.results, format, &path)?;
        println!();
        println!("Exported {} location(s) to {}", report.results.len(), path.display());
    }

    Ok(())
}

fn configure(
    key: Option<String>,
    default_location: Option<String>,
    units: Option<Units>,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    if !apply_settings(&mut config, key, default_location, units)? {
        prompt_config(&mut config)?;
    }

    config.save()?;
    println!(
        "Configuration saved to {}",
        Config::config_file_path()?.display()
    );

    Ok(())
}

/// Apply the values given as flags. Returns `false` when there were none.
fn apply_settings(
    config: &mut Config,
    key: Option<String>,
    default_location: Option<String>,
    units: Option<Units>,
) -> anyhow::Result<bool> {
    if key.is_none() && default_location.is_none() && units.is_none() {
        return Ok(false);
    }

    if let Some(key) = key {
        validate_api_key(&key)?;
        config.set_api_key(&key);
    }
    if let Some(location) = default_location {
        config.set_default_location(&location);
    }
    if let Some(units) = units {
        config.units = units;
    }

    Ok(true)
}

fn prompt_config(config: &mut Config) -> anyhow::Result<()> {
    let help = if config.api_key.is_some() {
        "Leave empty to keep the current key"
    } else {
        "Get one at https://openweathermap.org/api"
    };

    let key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message(help)
        .prompt()
        .context("Failed to read API key")?;

    if !key.trim().is_empty() {
        validate_api_key(&key)?;
        config.set_api_key(&key);
    }

    let location = Text::new("Default location:")
        .with_default(config.default_location.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read default location")?;
    config.set_default_location(&location);

    let options = vec![Units::Metric, Units::Imperial];
    let cursor = options.iter().position(|u| *u == config.units).unwrap_or(0);
    config.units = Select::new("Units:", options)
        .with_starting_cursor(cursor)
        .prompt()
        .context("Failed to read unit system")?;

    Ok(())
}

fn history(clear: bool) -> anyhow::Result<()> {
    let mut history = SearchHistory::load()?;

    if clear {
        history.clear();
        history.save()?;
        println!("Search history cleared.");
        return Ok(());
    }

    if history.is_empty() {
        println!("No recent searches.");
        return Ok(());
    }

    println!("{}", "Recent searches".bold());
    for (i, location) in history.entries().iter().rev().enumerate() {
        println!("{:>2}. {location}", i + 1);
    }

    Ok(())
}

/// One notice per failed location: a forecast failure adds nothing once the
/// current conditions of the same location already failed.
fn notices(problems: &[FetchError]) -> Vec<&FetchError> {
    let dropped: Vec<&str> = problems
        .iter()
        .filter(|p| p.endpoint() == Some(Endpoint::Current))
        .filter_map(FetchError::location)
        .collect();

    problems
        .iter()
        .filter(|p| {
            p.endpoint() != Some(Endpoint::Forecast)
                || !p.location().is_some_and(|l| dropped.contains(&l))
        })
        .collect()
}

/// Best effort: a broken history file never fails a lookup.
fn record_history(locations: &[String]) {
    let result = SearchHistory::load().and_then(|mut history| {
        for location in locations {
            history.record(location);
        }
        history.save()
    });

    if let Err(err) = result {
        warn!(error = %err, "could not update search history");
    }
}

fn resolve_locations(
    locations: Vec<String>,
    default_location: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let given: Vec<String> = locations
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    if !given.is_empty() {
        return Ok(given);
    }

    match default_location.map(str::trim).filter(|l| !l.is_empty()) {
        Some(location) => Ok(vec![location.to_string()]),
        None => bail!(
            "No location given.\n\
             Hint: pass one, e.g. `weatherwise show London`, or set a default with \
             `weatherwise configure --default-location <CITY>`."
        ),
    }
}

fn resolve_export(
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> anyhow::Result<Option<(ExportFormat, PathBuf)>> {
    match (format, output) {
        (None, None) => Ok(None),
        (Some(format), Some(path)) => Ok(Some((format, path))),
        (Some(format), None) => Ok(Some((
            format,
            PathBuf::from(format!("weather.{}", format.as_str())),
        ))),
        (None, Some(path)) => match ExportFormat::from_path(&path) {
            Some(format) => Ok(Some((format, path))),
            None => bail!(
                "Cannot infer export format from '{}'. Use --export csv or --export json.",
                path.display()
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn show_parses_locations_and_flags() {
        let cli = Cli::try_parse_from([
            "weatherwise",
            "show",
            "London",
            "New York",
            "--units",
            "imperial",
            "--export",
            "csv",
            "--graph",
        ])
        .unwrap();

        match cli.command {
            Command::Show {
                locations,
                units,
                export,
                output,
                graph,
            } => {
                assert_eq!(locations, ["London", "New York"]);
                assert_eq!(units, Some(Units::Imperial));
                assert_eq!(export, Some(ExportFormat::Csv));
                assert_eq!(output, None);
                assert!(graph);
            }
            other => panic!("Expected Show, got {other:?}"),
        }
    }

    #[test]
    fn configure_stores_key_from_global_flag() {
        let cli =
            Cli::try_parse_args(["weatherwise", "configure", "--api-key", "REAL_KEY"]).unwrap();
        assert!(cli.api_key_from_flag);

        let Command::Configure {
            key,
            default_location,
            units,
        } = cli.command
        else {
            panic!("Expected Configure");
        };
        let key = key.or(cli.api_key.filter(|_| cli.api_key_from_flag));

        let mut config = Config::default();
        let applied = apply_settings(&mut config, key, default_location, units).unwrap();

        assert!(applied);
        assert_eq!(config.api_key.as_deref(), Some("REAL_KEY"));
    }

    #[test]
    fn api_key_flag_before_subcommand_is_detected() {
        let cli = Cli::try_parse_args(["weatherwise", "--api-key", "K", "history"]).unwrap();
        assert!(cli.api_key_from_flag);
        assert_eq!(cli.api_key.as_deref(), Some("K"));
    }

    #[test]
    fn configure_without_flags_applies_nothing() {
        let mut config = Config::default();
        assert!(!apply_settings(&mut config, None, None, None).unwrap());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn configure_rejects_placeholder_key() {
        let mut config = Config::default();
        let err = apply_settings(&mut config, Some("your_api_key".into()), None, None).unwrap_err();
        assert!(err.to_string().contains("placeholder"));
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn one_notice_per_dropped_location() {
        let problems = vec![
            FetchError::Unauthorized {
                location: "Atlantis".into(),
                endpoint: Endpoint::Current,
            },
            FetchError::Unauthorized {
                location: "Atlantis".into(),
                endpoint: Endpoint::Forecast,
            },
            FetchError::Transport {
                location: "Paris".into(),
                endpoint: Endpoint::Forecast,
                message: "request timed out".into(),
            },
        ];

        let shown = notices(&problems);

        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].endpoint(), Some(Endpoint::Current));
        assert_eq!(shown[1].location(), Some("Paris"));
    }

    #[test]
    fn bad_units_are_rejected() {
        let err = Cli::try_parse_from(["weatherwise", "show", "--units", "kelvin"]).unwrap_err();
        assert!(err.to_string().contains("kelvin"));
    }

    #[test]
    fn locations_fall_back_to_default() {
        let got = resolve_locations(vec!["  ".into()], Some("London")).unwrap();
        assert_eq!(got, ["London"]);

        let got = resolve_locations(vec![" Paris ".into()], Some("London")).unwrap();
        assert_eq!(got, ["Paris"]);
    }

    #[test]
    fn missing_location_is_an_error() {
        let err = resolve_locations(Vec::new(), None).unwrap_err();
        assert!(err.to_string().contains("No location given"));
    }

    #[test]
    fn export_target_resolution() {
        assert_eq!(resolve_export(None, None).unwrap(), None);
        assert_eq!(
            resolve_export(Some(ExportFormat::Json), None).unwrap(),
            Some((ExportFormat::Json, PathBuf::from("weather.json")))
        );
        assert_eq!(
            resolve_export(None, Some("out.csv".into())).unwrap(),
            Some((ExportFormat::Csv, PathBuf::from("out.csv")))
        );
        assert!(resolve_export(None, Some("out.txt".into())).is_err());
    }
}

//! Core library for the `weatherwise` CLI.
//!
//! This crate defines:
//! - Configuration and search history stored on disk
//! - The OpenWeatherMap client behind a provider abstraction
//! - Concurrent batch fetching and aggregation into per-location results with alerts
//! - CSV/JSON export of those results
//!
//! It is used by `weatherwise-cli`, but can also be reused by other binaries or services.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod history;
pub mod model;
pub mod provider;

pub use aggregate::{BatchReport, check_alerts, lookup};
pub use config::Config;
pub use error::{Endpoint, FetchError};
pub use export::{ExportFormat, export};
pub use fetch::{Progress, ProgressObserver};
pub use history::SearchHistory;
pub use model::{Alert, CurrentConditions, ForecastDay, LocationResult, Units};
pub use provider::{ProviderSettings, WeatherProvider, provider_from_config};

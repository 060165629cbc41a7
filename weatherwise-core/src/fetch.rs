//! Concurrent fetching of a batch of locations.

use futures::future::join_all;
use std::{
    fmt,
    sync::atomic::{AtomicUsize, Ordering},
};
use tracing::{Instrument, debug, info_span};

use crate::{
    error::FetchError,
    model::{CurrentConditions, ForecastDay},
    provider::WeatherProvider,
};

/// Notified each time an endpoint call of the batch completes.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize);
}

/// Append-only count of finished endpoint calls, shared by all fetches of a batch.
pub struct Progress<'a> {
    completed: AtomicUsize,
    total: usize,
    observer: Option<&'a dyn ProgressObserver>,
}

impl<'a> Progress<'a> {
    /// `total` is the number of endpoint calls, i.e. two per location.
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            observer: None,
        }
    }

    pub fn for_locations(count: usize) -> Self {
        Self::new(count * 2)
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    fn advance(&self) {
        let completed = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(observer) = self.observer {
            observer.on_progress(completed, self.total);
        }
    }
}

impl fmt::Debug for Progress<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("completed", &self.completed())
            .field("total", &self.total)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Raw result of both endpoint calls for one location.
#[derive(Debug)]
pub struct LocationOutcome {
    pub location: String,
    pub current: Result<CurrentConditions, FetchError>,
    pub forecast: Result<Vec<ForecastDay>, FetchError>,
}

/// Fetch current conditions and forecast for one location concurrently.
pub async fn fetch_location(
    provider: &dyn WeatherProvider,
    location: &str,
    progress: &Progress<'_>,
) -> LocationOutcome {
    let current = async {
        let res = provider.fetch_current(location).await;
        progress.advance();
        res
    };
    let forecast = async {
        let res = provider.fetch_forecast(location).await;
        progress.advance();
        res
    };

    let (current, forecast) = tokio::join!(current, forecast);
    debug!(
        location,
        current_ok = current.is_ok(),
        forecast_ok = forecast.is_ok(),
        "location fetched"
    );

    LocationOutcome {
        location: location.to_string(),
        current,
        forecast,
    }
}

/// Fetch every location of the batch concurrently.
///
/// The returned outcomes are in the same order as `locations`, whatever order
/// the requests complete in.
pub async fn fetch_batch(
    provider: &dyn WeatherProvider,
    locations: &[String],
    progress: &Progress<'_>,
) -> Vec<LocationOutcome> {
    let tasks = locations.iter().map(|location| {
        fetch_location(provider, location, progress)
            .instrument(info_span!("fetch_location", location = %location))
    });

    join_all(tasks).await
}

use std::fmt;
use thiserror::Error;

/// The two provider endpoints queried per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Current,
    Forecast,
}

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Current => "current",
            Endpoint::Forecast => "forecast",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a weather lookup.
///
/// [`FetchError::Credential`] and [`FetchError::Setup`] happen before any request
/// and abort the whole batch; every other variant is scoped to a single endpoint
/// of a single location.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(
        "Invalid API key: {reason}.\n\
         Hint: run `weatherwise configure --key <KEY>` or set OPENWEATHER_API_KEY."
    )]
    Credential { reason: String },

    #[error("Failed to initialise the HTTP client: {message}")]
    Setup { message: String },

    #[error("Could not reach the weather service for '{location}' ({endpoint}): {message}")]
    Transport {
        location: String,
        endpoint: Endpoint,
        message: String,
    },

    #[error("The API key was rejected (401 Unauthorized) while fetching '{location}' ({endpoint})")]
    Unauthorized { location: String, endpoint: Endpoint },

    #[error("Weather service error for '{location}' ({endpoint}): {message}")]
    Provider {
        location: String,
        endpoint: Endpoint,
        message: String,
    },
}

impl FetchError {
    pub fn credential(reason: impl Into<String>) -> Self {
        Self::Credential {
            reason: reason.into(),
        }
    }

    /// Location the failure belongs to, if it is scoped to one.
    pub fn location(&self) -> Option<&str> {
        match self {
            FetchError::Credential { .. } | FetchError::Setup { .. } => None,
            FetchError::Transport { location, .. }
            | FetchError::Unauthorized { location, .. }
            | FetchError::Provider { location, .. } => Some(location),
        }
    }

    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            FetchError::Credential { .. } | FetchError::Setup { .. } => None,
            FetchError::Transport { endpoint, .. }
            | FetchError::Unauthorized { endpoint, .. }
            | FetchError::Provider { endpoint, .. } => Some(*endpoint),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Unauthorized { .. })
    }
}

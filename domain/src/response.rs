use crate::{ExchangeRateInfo, LocationInfo, WeatherInfo, SERVER_VERSION};
use serde::{Deserialize, Serialize};

/// Default refresh interval suggested to the watch, in minutes
pub const DEFAULT_REFRESH_INTERVAL: u32 = 40;

fn server_version() -> String {
    SERVER_VERSION.to_owned()
}

/// Aggregated answer to a [`WatchRequest`](crate::WatchRequest)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub location: LocationInfo,
    pub weather: WeatherInfo,
    pub exchange: ExchangeRateInfo,
    #[serde(rename = "ref-interval")]
    pub refresh_interval: u32,
    #[serde(rename = "serverVersion", default = "server_version")]
    pub server_version: String,
}

impl WatchResponse {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            location: LocationInfo::default(),
            weather: WeatherInfo::default(),
            exchange: ExchangeRateInfo::default(),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            server_version: server_version(),
        }
    }
}

/// Body returned to clients on failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Canonical reason phrase of the status code
    pub status_message: String,
    pub description: String,
    #[serde(default = "server_version")]
    pub server_version: String,
}

impl ErrorResponse {
    pub fn new(
        status_code: u16,
        status_message: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            description: description.into(),
            server_version: server_version(),
        }
    }
}

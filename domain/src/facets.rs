use crate::RequestStatus;
use library::resilience::Outcome;
use serde::{Deserialize, Serialize};

/// Implements the shared facet plumbing: request id tagging, failure construction and [`Outcome`]
macro_rules! facet {
    ($facet:ident) => {
        impl $facet {
            /// Facet carrying only an error status
            pub fn failed(status: RequestStatus) -> Self {
                Self {
                    status,
                    ..Default::default()
                }
            }

            /// Tags the facet with the correlation key of its request
            pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
                self.request_id = request_id.into();
                self
            }
        }

        impl Outcome for $facet {
            fn is_success(&self) -> bool {
                self.status.is_ok()
            }

            fn failure(description: String) -> Self {
                Self::failed(RequestStatus::error(description))
            }
        }
    };
}

/// Name of the place at the requested coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
}

impl LocationInfo {
    pub fn ok(city_name: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            city_name: Some(city_name.into()),
            status: RequestStatus::ok(),
        }
    }
}

facet!(LocationInfo);

/// Current weather at the requested coordinates
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// Provider that actually answered
    #[serde(default)]
    pub weather_provider: Option<String>,
    /// Icon name in the DarkSky vocabulary (`clear-day`, `rain`, ...)
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub precip_probability: f64,
    /// Celsius
    #[serde(default)]
    pub temperature: f64,
    /// Meters per second
    #[serde(default)]
    pub wind_speed: f64,
    /// Relative humidity between 0 and 1
    #[serde(default)]
    pub humidity: f64,
    #[serde(default)]
    pub pressure: f64,
    #[serde(default)]
    pub status: RequestStatus,
}

facet!(WeatherInfo);

/// Exchange rate between the requested currencies
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    #[serde(default)]
    pub exchange_rate: f64,
    /// Provider that answered
    #[serde(default)]
    pub remote_source: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
}

impl ExchangeRateInfo {
    pub fn ok(exchange_rate: f64, remote_source: impl Into<String>) -> Self {
        Self {
            request_id: String::new(),
            exchange_rate,
            remote_source: Some(remote_source.into()),
            status: RequestStatus::ok(),
        }
    }
}

facet!(ExchangeRateInfo);

#[cfg(test)]
mod does {
    use super::*;
    use crate::RequestStatusCode;

    #[test]
    fn leave_data_empty_on_failure() {
        let info = ExchangeRateInfo::failure("timeout".into());

        assert_eq!(info.status.status_code, RequestStatusCode::Error);
        assert_eq!(info.exchange_rate, 0.0);
        assert_eq!(info.remote_source, None);
        assert!(!info.is_success());
    }

    #[test]
    fn default_to_not_requested() {
        let info = LocationInfo::default();

        assert_eq!(info.status.status_code, RequestStatusCode::HasNotBeenRequested);
        assert!(!info.is_success());
        assert!(LocationInfo::ok("Olathe, United States").is_success());
    }
}

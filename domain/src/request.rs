use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Weather services a watch may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherProvider {
    OpenWeather,
    DarkSky,
}

impl Default for WeatherProvider {
    fn default() -> Self {
        WeatherProvider::OpenWeather
    }
}

impl WeatherProvider {
    /// Parses the hint sent by the watch, case-insensitively, falling back to the default
    pub fn from_hint(hint: Option<&str>) -> Self {
        hint.and_then(|hint| hint.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for WeatherProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openweather" => Ok(WeatherProvider::OpenWeather),
            "darksky" => Ok(WeatherProvider::DarkSky),
            _ => Err(()),
        }
    }
}

impl fmt::Display for WeatherProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeatherProvider::OpenWeather => write!(f, "OpenWeather"),
            WeatherProvider::DarkSky => write!(f, "DarkSky"),
        }
    }
}

/// Request sent by a watch face
///
/// Field names follow the short query parameters used by the watch and are kept on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchRequest {
    /// Correlation key, assigned at ingress if the watch did not send one
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(rename = "did", default)]
    pub device_id: Option<String>,
    #[serde(rename = "av", default)]
    pub version: Option<String>,
    #[serde(rename = "fw", default)]
    pub framework: Option<String>,
    #[serde(rename = "ciqv", default)]
    pub ciq_version: Option<String>,
    #[serde(rename = "dn", default)]
    pub device_name: Option<String>,
    /// DarkSky key of the watch owner
    #[serde(rename = "wapikey", default)]
    pub dark_sky_key: Option<String>,
    #[serde(rename = "wp", default)]
    pub weather_provider: Option<String>,
    #[serde(rename = "bc", default)]
    pub base_currency: Option<String>,
    #[serde(rename = "tc", default)]
    pub target_currency: Option<String>,
    #[serde(rename = "requestTime", default = "Utc::now")]
    pub request_time: DateTime<Utc>,
}

impl Default for WatchRequest {
    fn default() -> Self {
        Self {
            request_id: String::new(),
            lat: None,
            lon: None,
            device_id: None,
            version: None,
            framework: None,
            ciq_version: None,
            device_name: None,
            dark_sky_key: None,
            weather_provider: None,
            base_currency: None,
            target_currency: None,
            request_time: Utc::now(),
        }
    }
}

impl WatchRequest {
    /// Coordinates, if both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    /// Weather provider requested by the watch
    pub fn weather_provider(&self) -> WeatherProvider {
        WeatherProvider::from_hint(self.weather_provider.as_deref())
    }

    /// Currency pair, if both currencies are present and non-empty
    pub fn currency_pair(&self) -> Option<(&str, &str)> {
        let base = self.base_currency.as_deref().filter(|c| !c.is_empty())?;
        let target = self.target_currency.as_deref().filter(|c| !c.is_empty())?;
        Some((base, target))
    }
}

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn parse_provider_hints_case_insensitively() {
        assert_eq!(WeatherProvider::from_hint(Some("DarkSky")), WeatherProvider::DarkSky);
        assert_eq!(WeatherProvider::from_hint(Some("DARKSKY")), WeatherProvider::DarkSky);
        assert_eq!(WeatherProvider::from_hint(Some("accuweather")), WeatherProvider::OpenWeather);
        assert_eq!(WeatherProvider::from_hint(None), WeatherProvider::OpenWeather);
    }

    #[test]
    fn read_short_field_names() {
        let request: WatchRequest = serde_json::from_str(
            r#"{"requestId": "r1", "lat": 38.855652, "lon": -94.799712, "did": "d1", "bc": "EUR", "tc": "PHP"}"#,
        )
        .unwrap();

        assert_eq!(request.request_id, "r1");
        assert_eq!(request.coordinates(), Some((38.855652, -94.799712)));
        assert_eq!(request.device_id.as_deref(), Some("d1"));
        assert_eq!(request.currency_pair(), Some(("EUR", "PHP")));
    }

    #[test]
    fn require_both_currencies() {
        let request = WatchRequest {
            base_currency: Some("EUR".into()),
            target_currency: Some(String::new()),
            ..Default::default()
        };

        assert_eq!(request.currency_pair(), None);
        assert_eq!(request.coordinates(), None);
    }
}

use super::http::get_json;
use super::ProviderError;
use async_trait::async_trait;
use domain::{RequestStatus, WeatherInfo, WeatherProvider};
use library::helpers::fill_template;
use library::resilience::{Cacheable, Provider};
use library::BoxedError;
use reqwest::Client;
use serde::Deserialize;

/// Coordinates to fetch the current weather for
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRequest {
    pub lat: f64,
    pub lon: f64,
    pub provider: WeatherProvider,
    /// DarkSky key supplied by the device
    pub dark_sky_key: Option<String>,
}

/// Weather changes too quickly to be cached
impl Cacheable for WeatherRequest {
    type Fingerprint = ();

    fn cache_key(&self) -> Option<String> {
        None
    }

    fn fingerprint(&self) -> Self::Fingerprint {}
}

/// Translates OpenWeather icon codes into the DarkSky vocabulary understood by the watch
fn condition_icon(code: &str) -> &'static str {
    match code {
        "01n" => "clear-night",
        "09d" | "09n" | "10d" | "10n" | "11d" | "11n" => "rain",
        "13d" | "13n" => "snow",
        "50d" | "50n" => "fog",
        "03d" | "03n" => "cloudy",
        "02d" | "04d" => "partly-cloudy-day",
        "02n" | "04n" => "partly-cloudy-night",
        _ => "clear-day",
    }
}

#[derive(Deserialize)]
struct OpenWeatherResponse {
    main: OpenWeatherMain,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
    wind: Option<OpenWeatherWind>,
}

#[derive(Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

#[derive(Deserialize)]
struct OpenWeatherCondition {
    icon: String,
}

#[derive(Deserialize)]
struct OpenWeatherWind {
    #[serde(default)]
    speed: f64,
}

/// Current weather from OpenWeather
///
/// Template placeholders: `{0}` latitude, `{1}` longitude, `{2}` key.
pub struct OpenWeather {
    client: Client,
    template: String,
    key: String,
}

impl OpenWeather {
    const NAME: &'static str = "OpenWeather";

    pub fn new(client: Client, template: String, key: String) -> Self {
        Self {
            client,
            template,
            key,
        }
    }
}

#[async_trait]
impl Provider for OpenWeather {
    type Request = WeatherRequest;
    type Output = WeatherInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &WeatherRequest) -> Result<WeatherInfo, BoxedError> {
        let url = fill_template(
            &self.template,
            &[
                request.lat.to_string().as_str(),
                request.lon.to_string().as_str(),
                self.key.as_str(),
            ],
        );

        let response: OpenWeatherResponse = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(response) => response,
            Err(status) => return Ok(WeatherInfo::failed(status)),
        };

        let icon = response
            .weather
            .first()
            .map(|condition| condition_icon(&condition.icon))
            .unwrap_or("clear-day");

        Ok(WeatherInfo {
            request_id: String::new(),
            weather_provider: Some(WeatherProvider::OpenWeather.to_string()),
            icon: Some(icon.to_owned()),
            precip_probability: 0.0,
            temperature: response.main.temp,
            wind_speed: response.wind.map(|w| w.speed).unwrap_or_default(),
            humidity: response.main.humidity / 100.0,
            pressure: response.main.pressure,
            status: RequestStatus::ok(),
        })
    }
}

#[derive(Deserialize)]
struct DarkSkyResponse {
    currently: DarkSkyCurrently,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DarkSkyCurrently {
    icon: Option<String>,
    #[serde(default)]
    precip_probability: f64,
    #[serde(default)]
    temperature: f64,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    humidity: f64,
    #[serde(default)]
    pressure: f64,
}

/// Current weather from DarkSky using the key of the device owner
///
/// Template placeholders: `{0}` key, `{1}` latitude, `{2}` longitude.
pub struct DarkSky {
    client: Client,
    template: String,
}

impl DarkSky {
    const NAME: &'static str = "DarkSky";

    pub fn new(client: Client, template: String) -> Self {
        Self { client, template }
    }

    fn device_key(request: &WeatherRequest) -> Option<&str> {
        request.dark_sky_key.as_deref().filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl Provider for DarkSky {
    type Request = WeatherRequest;
    type Output = WeatherInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &WeatherRequest) -> Result<WeatherInfo, BoxedError> {
        let key = Self::device_key(request).ok_or(ProviderError::MissingCredentials {
                provider: Self::NAME,
            })?;

        let url = fill_template(
            &self.template,
            &[
                key,
                request.lat.to_string().as_str(),
                request.lon.to_string().as_str(),
            ],
        );

        let currently = match get_json::<DarkSkyResponse>(&self.client, Self::NAME, &url).await? {
            Ok(response) => response.currently,
            Err(status) => return Ok(WeatherInfo::failed(status)),
        };

        Ok(WeatherInfo {
            request_id: String::new(),
            weather_provider: Some(WeatherProvider::DarkSky.to_string()),
            icon: currently.icon,
            precip_probability: currently.precip_probability,
            temperature: currently.temperature,
            wind_speed: currently.wind_speed,
            humidity: currently.humidity,
            pressure: currently.pressure,
            status: RequestStatus::ok(),
        })
    }

    /// Keys belong to the device, a request without one never reaches DarkSky
    fn accepts(&self, request: &WeatherRequest) -> bool {
        Self::device_key(request).is_some()
    }

    /// Rejected device keys say nothing about the health of DarkSky
    fn is_request_fault(&self, value: &WeatherInfo) -> bool {
        matches!(value.status.error_code, 401 | 403)
    }
}

use crate::options::{QueueingOptions, RedisOptions, TopicOptions};
use domain::FacetKind;
use library::helpers::parse_seconds;
use std::str::FromStr;
use std::time::Duration;
use structopt::StructOpt;
use thiserror::Error;

/// Secondary provider used when the CurrencyConverter fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeFallback {
    /// exchangerate.host
    ExchangeHost,
    /// twelvedata.com
    TwelveData,
}

/// Raised for unknown exchange fallback names
#[derive(Debug, Error)]
#[error("unknown exchange fallback '{0}', expected exchange-host or twelve-data")]
pub struct UnknownFallback(String);

impl FromStr for ExchangeFallback {
    type Err = UnknownFallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exchange-host" | "exchangehost" => Ok(ExchangeFallback::ExchangeHost),
            "twelve-data" | "twelvedata" => Ok(ExchangeFallback::TwelveData),
            _ => Err(UnknownFallback(s.to_owned())),
        }
    }
}

/// Options for the worker module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Facet resolved by this worker (location, weather or exchange-rate)
    pub facet: FacetKind,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub topics: TopicOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub providers: ProviderOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub resilience: ResilienceOptions,
}

/// URL templates and credentials of the remote providers
///
/// Templates contain positional placeholders (`{0}`, `{1}`, ...) documented on each provider.
#[derive(Debug, StructOpt)]
pub struct ProviderOptions {
    /// VirtualEarth locations URL ({0} latitude, {1} longitude, {2} key)
    #[structopt(
        long,
        env,
        default_value = "https://dev.virtualearth.net/REST/v1/Locations/{0},{1}?o=json&includeEntityTypes=PopulatedPlace,AdminDivision1,AdminDivision2,CountryRegion&key={2}"
    )]
    pub virtual_earth_url: String,

    /// VirtualEarth API key
    #[structopt(long, env, default_value = "", hide_env_values = true)]
    pub virtual_earth_key: String,

    /// Azure Maps reverse search URL ({0} latitude, {1} longitude, {2} key)
    #[structopt(
        long,
        env,
        default_value = "https://atlas.microsoft.com/search/address/reverse/json?api-version=1.0&query={0},{1}&subscription-key={2}"
    )]
    pub azure_maps_url: String,

    /// Azure Maps subscription key. The fallback is disabled when empty.
    #[structopt(long, env, default_value = "", hide_env_values = true)]
    pub azure_maps_key: String,

    /// OpenWeather current weather URL ({0} latitude, {1} longitude, {2} key)
    #[structopt(
        long,
        env,
        default_value = "https://api.openweathermap.org/data/2.5/weather?lat={0}&lon={1}&units=metric&appid={2}"
    )]
    pub open_weather_url: String,

    /// OpenWeather API key
    #[structopt(long, env, default_value = "", hide_env_values = true)]
    pub open_weather_key: String,

    /// DarkSky forecast URL ({0} device key, {1} latitude, {2} longitude)
    #[structopt(
        long,
        env,
        default_value = "https://api.darksky.net/forecast/{0}/{1},{2}?exclude=minutely,hourly,daily,flags,alerts&units=si"
    )]
    pub dark_sky_url: String,

    /// CurrencyConverter URL ({0} key, {1} base, {2} target)
    #[structopt(
        long,
        env,
        default_value = "https://free.currconv.com/api/v7/convert?apiKey={0}&q={1}_{2}&compact=ultra"
    )]
    pub currency_converter_url: String,

    /// CurrencyConverter API key
    #[structopt(long, env, default_value = "", hide_env_values = true)]
    pub currency_converter_key: String,

    /// ExchangeHost URL ({0} base, {1} target)
    #[structopt(
        long,
        env,
        default_value = "https://api.exchangerate.host/convert?from={0}&to={1}"
    )]
    pub exchange_host_url: String,

    /// TwelveData exchange rate URL ({0} key, {1} base, {2} target)
    #[structopt(
        long,
        env,
        default_value = "https://api.twelvedata.com/exchange_rate?apikey={0}&symbol={1}/{2}"
    )]
    pub twelve_data_url: String,

    /// TwelveData API key
    #[structopt(long, env, default_value = "", hide_env_values = true)]
    pub twelve_data_key: String,

    /// Provider queried when the CurrencyConverter fails (exchange-host or twelve-data)
    #[structopt(long, env, default_value = "exchange-host")]
    pub exchange_fallback: ExchangeFallback,

    /// Timeout for requests to remote providers in seconds
    #[structopt(long, env, default_value = "10", parse(try_from_str = parse_seconds))]
    pub http_timeout: Duration,
}

/// Caching and circuit breaking of the provider chains
#[derive(Debug, StructOpt)]
pub struct ResilienceOptions {
    /// Seconds a resolved location name stays valid for a device
    #[structopt(long, env, default_value = "86400", parse(try_from_str = parse_seconds))]
    pub location_cache_ttl: Duration,

    /// Seconds a resolved exchange rate stays valid
    #[structopt(long, env, default_value = "3600", parse(try_from_str = parse_seconds))]
    pub exchange_cache_ttl: Duration,

    /// Maximum number of cached entries per provider chain
    #[structopt(long, env, default_value = "10000")]
    pub cache_size: usize,

    /// Consecutive failures of a primary provider before the fallback is used exclusively
    #[structopt(long, env, default_value = "2")]
    pub breaker_failure_threshold: u32,

    /// Seconds the fallback is used exclusively before the primary is tried again
    #[structopt(long, env, default_value = "36000", parse(try_from_str = parse_seconds))]
    pub breaker_cool_down: Duration,
}

//! Binding of a facet to its provider chain

use super::options::{ExchangeFallback, ProviderOptions, ResilienceOptions};
use super::providers::*;
use async_trait::async_trait;
use domain::{
    ExchangeRateInfo, FacetKind, LocationInfo, WatchMessage, WatchRequest, WeatherInfo,
    WeatherProvider,
};
use library::resilience::{BreakerConfig, Provider, Resolved, ResilientChain};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

/// Resolves one facet of a [`WatchRequest`]
///
/// Resolution never fails, problems are expressed through the status of the returned facet.
#[async_trait]
pub trait FacetResolver {
    /// Facet produced by this resolver
    fn kind(&self) -> FacetKind;

    /// Resolves the facet. Requests lacking the required inputs yield a facet that has not been requested.
    async fn resolve(&self, request: &WatchRequest) -> WatchMessage;
}

/// Dynamic dispatch version of [`FacetResolver`]
pub type BoxedFacetResolver = Arc<dyn FacetResolver + Send + Sync>;

fn log_source<O>(kind: FacetKind, resolved: &Resolved<O>) {
    debug!(facet = %kind, source = ?resolved.source, "Resolved facet");
}

/// Place name of the device location
pub struct LocationResolver {
    chain: ResilientChain<LocationRequest, LocationInfo>,
}

impl LocationResolver {
    pub fn new(chain: ResilientChain<LocationRequest, LocationInfo>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl FacetResolver for LocationResolver {
    fn kind(&self) -> FacetKind {
        FacetKind::Location
    }

    async fn resolve(&self, request: &WatchRequest) -> WatchMessage {
        let (lat, lon) = match request.coordinates() {
            Some(coordinates) => coordinates,
            None => return LocationInfo::default().into(),
        };

        let resolved = self
            .chain
            .resolve(&LocationRequest {
                device_id: request.device_id.clone(),
                lat,
                lon,
            })
            .await;

        log_source(self.kind(), &resolved);
        resolved.value.into()
    }
}

/// Current weather at the device location
///
/// Requests for DarkSky fall back to OpenWeather, requests for OpenWeather have no fallback.
pub struct WeatherResolver {
    dark_sky: ResilientChain<WeatherRequest, WeatherInfo>,
    open_weather: ResilientChain<WeatherRequest, WeatherInfo>,
}

impl WeatherResolver {
    pub fn new(
        dark_sky: ResilientChain<WeatherRequest, WeatherInfo>,
        open_weather: ResilientChain<WeatherRequest, WeatherInfo>,
    ) -> Self {
        Self {
            dark_sky,
            open_weather,
        }
    }
}

#[async_trait]
impl FacetResolver for WeatherResolver {
    fn kind(&self) -> FacetKind {
        FacetKind::Weather
    }

    async fn resolve(&self, request: &WatchRequest) -> WatchMessage {
        let (lat, lon) = match request.coordinates() {
            Some(coordinates) => coordinates,
            None => return WeatherInfo::default().into(),
        };

        let weather_request = WeatherRequest {
            lat,
            lon,
            provider: request.weather_provider(),
            dark_sky_key: request.dark_sky_key.clone(),
        };

        let chain = match weather_request.provider {
            WeatherProvider::DarkSky => &self.dark_sky,
            WeatherProvider::OpenWeather => &self.open_weather,
        };

        let resolved = chain.resolve(&weather_request).await;
        log_source(self.kind(), &resolved);
        resolved.value.into()
    }
}

/// Exchange rate between the currencies chosen on the device
pub struct ExchangeResolver {
    chain: ResilientChain<ExchangeRequest, ExchangeRateInfo>,
}

impl ExchangeResolver {
    pub fn new(chain: ResilientChain<ExchangeRequest, ExchangeRateInfo>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl FacetResolver for ExchangeResolver {
    fn kind(&self) -> FacetKind {
        FacetKind::ExchangeRate
    }

    async fn resolve(&self, request: &WatchRequest) -> WatchMessage {
        let (base, target) = match request.currency_pair() {
            Some((base, target)) if base != target => (base, target),
            _ => return ExchangeRateInfo::default().into(),
        };

        let resolved = self
            .chain
            .resolve(&ExchangeRequest {
                base: base.to_owned(),
                target: target.to_owned(),
            })
            .await;

        log_source(self.kind(), &resolved);
        resolved.value.into()
    }
}

/// Builds the resolver for a facet from the configured providers
pub fn build_resolver(
    kind: FacetKind,
    providers: &ProviderOptions,
    resilience: &ResilienceOptions,
) -> Result<BoxedFacetResolver, reqwest::Error> {
    let client = Client::builder().timeout(providers.http_timeout).build()?;
    let breaker = BreakerConfig {
        failure_threshold: resilience.breaker_failure_threshold,
        cool_down: resilience.breaker_cool_down,
    };

    let resolver: BoxedFacetResolver = match kind {
        FacetKind::Location => {
            let mut chain = ResilientChain::new(
                kind.as_str(),
                Arc::new(VirtualEarth::new(
                    client.clone(),
                    providers.virtual_earth_url.clone(),
                    providers.virtual_earth_key.clone(),
                )),
            );

            if !providers.azure_maps_key.is_empty() {
                chain = chain.with_fallback(
                    Arc::new(AzureMaps::new(
                        client,
                        providers.azure_maps_url.clone(),
                        providers.azure_maps_key.clone(),
                    )),
                    breaker,
                );
            }

            Arc::new(LocationResolver::new(chain.with_cache(
                resilience.cache_size,
                resilience.location_cache_ttl,
            )))
        }
        FacetKind::Weather => {
            let open_weather: Arc<dyn Provider<Request = WeatherRequest, Output = WeatherInfo>> =
                Arc::new(OpenWeather::new(
                    client.clone(),
                    providers.open_weather_url.clone(),
                    providers.open_weather_key.clone(),
                ));

            let dark_sky = ResilientChain::new(
                kind.as_str(),
                Arc::new(DarkSky::new(client, providers.dark_sky_url.clone())),
            )
            .with_fallback(open_weather.clone(), breaker);

            Arc::new(WeatherResolver::new(
                dark_sky,
                ResilientChain::new(kind.as_str(), open_weather),
            ))
        }
        FacetKind::ExchangeRate => {
            let fallback: Arc<dyn Provider<Request = ExchangeRequest, Output = ExchangeRateInfo>> =
                match providers.exchange_fallback {
                    ExchangeFallback::ExchangeHost => Arc::new(ExchangeHost::new(
                        client.clone(),
                        providers.exchange_host_url.clone(),
                    )),
                    ExchangeFallback::TwelveData => Arc::new(TwelveData::new(
                        client.clone(),
                        providers.twelve_data_url.clone(),
                        providers.twelve_data_key.clone(),
                    )),
                };

            let chain = ResilientChain::new(
                kind.as_str(),
                Arc::new(CurrencyConverter::new(
                    client,
                    providers.currency_converter_url.clone(),
                    providers.currency_converter_key.clone(),
                )),
            )
            .with_fallback(fallback, breaker)
            .with_cache(resilience.cache_size, resilience.exchange_cache_ttl);

            Arc::new(ExchangeResolver::new(chain))
        }
    };

    Ok(resolver)
}

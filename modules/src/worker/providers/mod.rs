//! HTTP clients for the remote services answering facet requests
//!
//! Providers translate non-success HTTP responses into facets carrying an error status and report
//! transport or parsing failures as [`ProviderError`]. Both are treated as failures by the
//! [`ResilientChain`](library::resilience::ResilientChain) wrapping them.

mod exchange;
mod http;
mod location;
mod weather;

pub use exchange::{CurrencyConverter, ExchangeHost, ExchangeRequest, TwelveData};
pub use http::ProviderError;
pub use location::{AzureMaps, LocationRequest, VirtualEarth};
pub use weather::{DarkSky, OpenWeather, WeatherRequest};

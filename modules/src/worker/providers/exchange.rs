use super::http::{get_json, missing};
use async_trait::async_trait;
use domain::ExchangeRateInfo;
use library::helpers::fill_template;
use library::resilience::{Cacheable, Provider};
use library::BoxedError;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// Currency pair to convert between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub base: String,
    pub target: String,
}

impl Cacheable for ExchangeRequest {
    type Fingerprint = ();

    fn cache_key(&self) -> Option<String> {
        Some(format!("er-{}-{}", self.base, self.target))
    }

    fn fingerprint(&self) -> Self::Fingerprint {}
}

/// Exchange rates from currencyconverterapi.com
///
/// Template placeholders: `{0}` key, `{1}` base currency, `{2}` target currency.
pub struct CurrencyConverter {
    client: Client,
    template: String,
    key: String,
}

impl CurrencyConverter {
    const NAME: &'static str = "CurrencyConverter";

    pub fn new(client: Client, template: String, key: String) -> Self {
        Self {
            client,
            template,
            key,
        }
    }
}

#[async_trait]
impl Provider for CurrencyConverter {
    type Request = ExchangeRequest;
    type Output = ExchangeRateInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &ExchangeRequest) -> Result<ExchangeRateInfo, BoxedError> {
        let url = fill_template(
            &self.template,
            &[
                self.key.as_str(),
                request.base.as_str(),
                request.target.as_str(),
            ],
        );

        let rates: HashMap<String, f64> = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(rates) => rates,
            Err(status) => return Ok(ExchangeRateInfo::failed(status)),
        };

        let pair = format!("{}_{}", request.base, request.target);
        let rate = rates
            .get(&pair)
            .copied()
            .ok_or_else(|| missing(Self::NAME, "no rate for the requested pair"))?;

        Ok(ExchangeRateInfo::ok(rate, Self::NAME))
    }
}

#[derive(Deserialize)]
struct ExchangeHostResponse {
    info: Option<ExchangeHostInfo>,
}

#[derive(Deserialize)]
struct ExchangeHostInfo {
    rate: Option<f64>,
}

/// Exchange rates from exchangerate.host
///
/// Template placeholders: `{0}` base currency, `{1}` target currency.
pub struct ExchangeHost {
    client: Client,
    template: String,
}

impl ExchangeHost {
    const NAME: &'static str = "ExchangeHost";

    pub fn new(client: Client, template: String) -> Self {
        Self { client, template }
    }
}

#[async_trait]
impl Provider for ExchangeHost {
    type Request = ExchangeRequest;
    type Output = ExchangeRateInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &ExchangeRequest) -> Result<ExchangeRateInfo, BoxedError> {
        let url = fill_template(&self.template, &[request.base.as_str(), request.target.as_str()]);

        let response: ExchangeHostResponse = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(response) => response,
            Err(status) => return Ok(ExchangeRateInfo::failed(status)),
        };

        let rate = response
            .info
            .and_then(|info| info.rate)
            .ok_or_else(|| missing(Self::NAME, "no conversion info"))?;

        Ok(ExchangeRateInfo::ok(rate, Self::NAME))
    }
}

#[derive(Deserialize)]
struct TwelveDataResponse {
    rate: Option<f64>,
}

/// Exchange rates from twelvedata.com
///
/// Template placeholders: `{0}` key, `{1}` base currency, `{2}` target currency.
pub struct TwelveData {
    client: Client,
    template: String,
    key: String,
}

impl TwelveData {
    const NAME: &'static str = "TwelveData";

    pub fn new(client: Client, template: String, key: String) -> Self {
        Self {
            client,
            template,
            key,
        }
    }
}

#[async_trait]
impl Provider for TwelveData {
    type Request = ExchangeRequest;
    type Output = ExchangeRateInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &ExchangeRequest) -> Result<ExchangeRateInfo, BoxedError> {
        let url = fill_template(
            &self.template,
            &[
                self.key.as_str(),
                request.base.as_str(),
                request.target.as_str(),
            ],
        );

        let response: TwelveDataResponse = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(response) => response,
            Err(status) => return Ok(ExchangeRateInfo::failed(status)),
        };

        let rate = response
            .rate
            .ok_or_else(|| missing(Self::NAME, "no rate"))?;

        Ok(ExchangeRateInfo::ok(rate, Self::NAME))
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use domain::RequestStatusCode;
    use library::resilience::{BreakerConfig, ResilientChain, ResolvedSource};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pair(base: &str, target: &str) -> ExchangeRequest {
        ExchangeRequest {
            base: base.into(),
            target: target.into(),
        }
    }

    #[tokio::test]
    async fn read_currency_converter_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v7/convert"))
            .and(query_param("q", "EUR_PHP"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"EUR_PHP": 51.440375}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let provider = CurrencyConverter::new(
            Client::new(),
            format!("{}/api/v7/convert?apiKey={{0}}&q={{1}}_{{2}}&compact=ultra", server.uri()),
            "secret".into(),
        );

        let info = provider.fetch(&pair("EUR", "PHP")).await.unwrap();
        assert_eq!(info.exchange_rate, 51.440375);
        assert_eq!(info.remote_source.as_deref(), Some("CurrencyConverter"));
        assert!(provider.fetch(&pair("EUR", "USD")).await.is_err());
    }

    #[tokio::test]
    async fn fall_back_to_exchange_host_and_cache() {
        let converter = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&converter)
            .await;

        let host = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/convert"))
            .and(query_param("from", "EUR"))
            .and(query_param("to", "RUB"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"info": {"rate": 70.155903}}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&host)
            .await;

        let chain = ResilientChain::new(
            "exchange-rate",
            Arc::new(CurrencyConverter::new(
                Client::new(),
                format!("{}/convert?apiKey={{0}}&q={{1}}_{{2}}", converter.uri()),
                "secret".into(),
            )),
        )
        .with_fallback(
            Arc::new(ExchangeHost::new(
                Client::new(),
                format!("{}/convert?from={{0}}&to={{1}}", host.uri()),
            )),
            BreakerConfig::default(),
        )
        .with_cache(16, Duration::from_secs(3600));

        let first = chain.resolve(&pair("EUR", "RUB")).await;
        assert_eq!(first.source, ResolvedSource::Fallback);
        assert_eq!(first.value.exchange_rate, 70.155903);
        assert_eq!(first.value.status.status_code, RequestStatusCode::Ok);

        let second = chain.resolve(&pair("EUR", "RUB")).await;
        assert_eq!(second.source, ResolvedSource::Cache);
        assert_eq!(second.value, first.value);
    }

    #[tokio::test]
    async fn read_twelve_data_rate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(r#"{"symbol": "EUR/USD", "rate": 1.0817}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let provider = TwelveData::new(
            Client::new(),
            format!("{}/exchange_rate?apikey={{0}}&symbol={{1}}/{{2}}", server.uri()),
            "secret".into(),
        );

        let info = provider.fetch(&pair("EUR", "USD")).await.unwrap();
        assert_eq!(info.exchange_rate, 1.0817);
    }
}

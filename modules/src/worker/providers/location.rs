use super::http::{get_json, missing};
use async_trait::async_trait;
use domain::LocationInfo;
use library::helpers::fill_template;
use library::resilience::{Cacheable, Provider};
use library::BoxedError;
use reqwest::Client;
use serde::Deserialize;

/// Coordinates of a device to look up the place name for
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRequest {
    pub device_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
}

impl Cacheable for LocationRequest {
    type Fingerprint = (f64, f64);

    /// Devices rarely move far between requests so the name is cached per device
    fn cache_key(&self) -> Option<String> {
        self.device_id
            .as_ref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("loc-{}", id))
    }

    fn fingerprint(&self) -> Self::Fingerprint {
        (self.lat, self.lon)
    }
}

fn join_place(locality: Option<String>, country: Option<String>) -> String {
    let locality = locality.map(|l| format!("{}, ", l)).unwrap_or_default();
    format!("{}{}", locality, country.unwrap_or_default())
}

#[derive(Deserialize)]
struct VirtualEarthResponse {
    #[serde(rename = "resourceSets")]
    resource_sets: Vec<VirtualEarthResourceSet>,
}

#[derive(Deserialize)]
struct VirtualEarthResourceSet {
    #[serde(default)]
    resources: Vec<VirtualEarthResource>,
}

#[derive(Deserialize)]
struct VirtualEarthResource {
    address: VirtualEarthAddress,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VirtualEarthAddress {
    locality: Option<String>,
    admin_district: Option<String>,
    country_region: Option<String>,
}

/// Reverse geocoding through the Bing Maps (VirtualEarth) locations API
///
/// Template placeholders: `{0}` latitude, `{1}` longitude, `{2}` key.
pub struct VirtualEarth {
    client: Client,
    template: String,
    key: String,
}

impl VirtualEarth {
    const NAME: &'static str = "VirtualEarth";

    pub fn new(client: Client, template: String, key: String) -> Self {
        Self {
            client,
            template,
            key,
        }
    }
}

#[async_trait]
impl Provider for VirtualEarth {
    type Request = LocationRequest;
    type Output = LocationInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &LocationRequest) -> Result<LocationInfo, BoxedError> {
        let url = fill_template(
            &self.template,
            &[
                request.lat.to_string().as_str(),
                request.lon.to_string().as_str(),
                self.key.as_str(),
            ],
        );

        let response: VirtualEarthResponse = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(response) => response,
            Err(status) => return Ok(LocationInfo::failed(status)),
        };

        let resources = response
            .resource_sets
            .into_iter()
            .next()
            .ok_or_else(|| missing(Self::NAME, "no resource set"))?
            .resources;

        let place = match resources.into_iter().next() {
            Some(resource) => {
                let address = resource.address;
                join_place(
                    address.locality.or(address.admin_district),
                    address.country_region,
                )
            }
            None => String::new(),
        };

        Ok(LocationInfo::ok(place))
    }
}

#[derive(Deserialize)]
struct AzureMapsResponse {
    #[serde(default)]
    features: Vec<AzureMapsFeature>,
}

#[derive(Deserialize)]
struct AzureMapsFeature {
    properties: AzureMapsProperties,
}

#[derive(Deserialize)]
struct AzureMapsProperties {
    address: AzureMapsAddress,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureMapsAddress {
    locality: Option<String>,
    #[serde(default)]
    admin_districts: Vec<String>,
    country_region: Option<AzureMapsCountry>,
}

#[derive(Deserialize)]
struct AzureMapsCountry {
    name: Option<String>,
}

/// Reverse geocoding through the Azure Maps search API
///
/// Template placeholders: `{0}` latitude, `{1}` longitude, `{2}` subscription key.
pub struct AzureMaps {
    client: Client,
    template: String,
    key: String,
}

impl AzureMaps {
    const NAME: &'static str = "AzureMaps";

    pub fn new(client: Client, template: String, key: String) -> Self {
        Self {
            client,
            template,
            key,
        }
    }
}

#[async_trait]
impl Provider for AzureMaps {
    type Request = LocationRequest;
    type Output = LocationInfo;

    fn name(&self) -> &str {
        Self::NAME
    }

    async fn fetch(&self, request: &LocationRequest) -> Result<LocationInfo, BoxedError> {
        let url = fill_template(
            &self.template,
            &[
                request.lat.to_string().as_str(),
                request.lon.to_string().as_str(),
                self.key.as_str(),
            ],
        );

        let response: AzureMapsResponse = match get_json(&self.client, Self::NAME, &url).await? {
            Ok(response) => response,
            Err(status) => return Ok(LocationInfo::failed(status)),
        };

        let place = match response.features.into_iter().next() {
            Some(feature) => {
                let address = feature.properties.address;
                let locality = address
                    .locality
                    .or_else(|| address.admin_districts.into_iter().next());
                join_place(locality, address.country_region.and_then(|c| c.name))
            }
            None => String::new(),
        };

        Ok(LocationInfo::ok(place))
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use domain::RequestStatusCode;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const OLATHE: LocationRequest = LocationRequest {
        device_id: None,
        lat: 38.855652,
        lon: -94.799712,
    };

    #[tokio::test]
    async fn read_virtual_earth_locality() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/REST/v1/Locations/38.855652,-94.799712"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"resourceSets": [{"resources": [{"name": "Olathe, United States", "address": {"adminDistrict": "KS", "adminDistrict2": "Johnson Co.", "countryRegion": "United States", "formattedAddress": "Olathe, United States", "locality": "Olathe"}}]}]}"#,
                "application/json",
            ))
            .expect(1)
            .mount(&server)
            .await;

        let provider = VirtualEarth::new(
            Client::new(),
            format!("{}/REST/v1/Locations/{{0}},{{1}}?o=json&key={{2}}", server.uri()),
            "secret".into(),
        );

        let info = provider.fetch(&OLATHE).await.unwrap();
        assert_eq!(info.status.status_code, RequestStatusCode::Ok);
        assert_eq!(info.city_name.as_deref(), Some("Olathe, United States"));
    }

    #[tokio::test]
    async fn fall_back_to_admin_district() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"features": [{"properties": {"address": {"adminDistricts": ["Johnson Co."], "countryRegion": {"name": "United States"}}}}]}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let provider = AzureMaps::new(
            Client::new(),
            format!("{}/reverse?query={{0}},{{1}}&subscription-key={{2}}", server.uri()),
            "secret".into(),
        );

        let info = provider.fetch(&OLATHE).await.unwrap();
        assert_eq!(info.city_name.as_deref(), Some("Johnson Co., United States"));
    }

    #[tokio::test]
    async fn report_http_errors_as_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let provider = AzureMaps::new(
            Client::new(),
            format!("{}/reverse?query={{0}},{{1}}&subscription-key={{2}}", server.uri()),
            "secret".into(),
        );

        let info = provider.fetch(&OLATHE).await.unwrap();
        assert_eq!(info.status.status_code, RequestStatusCode::Error);
        assert_eq!(info.status.error_code, 400);
        assert_eq!(info.city_name, None);
    }

    #[tokio::test]
    async fn reject_unreadable_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html>", "text/html"))
            .mount(&server)
            .await;

        let provider = VirtualEarth::new(
            Client::new(),
            format!("{}/{{0}},{{1}}?key={{2}}", server.uri()),
            "secret".into(),
        );

        assert!(provider.fetch(&OLATHE).await.is_err());
    }

    #[test]
    fn cache_per_device() {
        let request = LocationRequest {
            device_id: Some("d1".into()),
            ..OLATHE
        };

        assert_eq!(request.cache_key().as_deref(), Some("loc-d1"));
        assert_eq!(OLATHE.cache_key(), None);
    }
}

use crate::{ExchangeRateInfo, LocationInfo, WatchRequest, WeatherInfo};
use library::communication::collector::Classify;
use library::message_union;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

message_union! {
    /// Every payload exchanged between the api and the workers
    #[derive(Debug, Clone, PartialEq)]
    pub enum WatchMessage {
        WatchRequest(WatchRequest),
        LocationInfo(LocationInfo),
        WeatherInfo(WeatherInfo),
        ExchangeRateInfo(ExchangeRateInfo),
    }
}

/// Part of a [`WatchResponse`](crate::WatchResponse) resolved by a dedicated worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FacetKind {
    Location,
    Weather,
    ExchangeRate,
}

impl FacetKind {
    /// All facets, in response order
    pub fn all() -> [FacetKind; 3] {
        [FacetKind::Location, FacetKind::Weather, FacetKind::ExchangeRate]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FacetKind::Location => "location",
            FacetKind::Weather => "weather",
            FacetKind::ExchangeRate => "exchange-rate",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown facet '{0}', expected one of location, weather, exchange-rate")]
pub struct UnknownFacet(String);

impl FromStr for FacetKind {
    type Err = UnknownFacet;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location" => Ok(FacetKind::Location),
            "weather" => Ok(FacetKind::Weather),
            "exchange-rate" | "exchange" => Ok(FacetKind::ExchangeRate),
            other => Err(UnknownFacet(other.to_owned())),
        }
    }
}

impl fmt::Display for FacetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Classify for WatchMessage {
    type Kind = FacetKind;

    fn kind(&self) -> Option<FacetKind> {
        match self {
            WatchMessage::WatchRequest(_) => None,
            WatchMessage::LocationInfo(_) => Some(FacetKind::Location),
            WatchMessage::WeatherInfo(_) => Some(FacetKind::Weather),
            WatchMessage::ExchangeRateInfo(_) => Some(FacetKind::ExchangeRate),
        }
    }
}

impl WatchMessage {
    /// Tags a facet payload with the correlation key, requests are returned unchanged
    pub fn with_request_id(self, request_id: &str) -> Self {
        match self {
            WatchMessage::LocationInfo(info) => info.with_request_id(request_id).into(),
            WatchMessage::WeatherInfo(info) => info.with_request_id(request_id).into(),
            WatchMessage::ExchangeRateInfo(info) => info.with_request_id(request_id).into(),
            request => request,
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use library::communication::event::KnownMessage;
    use pretty_assertions::assert_eq;

    #[test]
    fn name_types_after_variants() {
        let message = KnownMessage::new("r1", WatchMessage::from(LocationInfo::ok("Olathe")));
        let raw = message.encode().unwrap();

        assert_eq!(raw.header.message_type, "LocationInfo");
        assert_eq!(KnownMessage::<WatchMessage>::decode(&raw).unwrap(), message);
    }

    #[test]
    fn classify_facets_only() {
        assert_eq!(WatchMessage::from(WatchRequest::default()).kind(), None);
        assert_eq!(
            WatchMessage::from(ExchangeRateInfo::default()).kind(),
            Some(FacetKind::ExchangeRate)
        );
    }

    #[test]
    fn parse_facet_names() {
        for kind in FacetKind::all().iter() {
            assert_eq!(kind.to_string().parse::<FacetKind>().unwrap(), *kind);
        }
        assert!("currency".parse::<FacetKind>().is_err());
    }
}

use super::metrics::RequestMetrics;
use domain::{
    ExchangeRateInfo, ErrorResponse, FacetKind, LocationInfo, RequestStatus, WatchMessage,
    WatchRequest, WatchResponse, WeatherInfo,
};
use library::communication::collector::{Collection, CollectorError, ReplayCollector};
use library::communication::event::{KnownMessage, MessagePublisher, TopicDescriptor};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, field, info, instrument, warn, Span};
use uuid::Uuid;
use warp::http::StatusCode;

/// Reasons why a request could not be answered
///
/// All of them are transient, the watch is expected to retry.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request has not been accepted by the broker
    #[error("request {key} could not be delivered to the workers: {reason}")]
    DeliveryFailed {
        /// Correlation key of the request
        key: String,
        /// What went wrong while publishing
        reason: String,
    },
    /// No facet has been received in time or the received key did not match
    #[error("no results have been received for request {key}")]
    RequestLost {
        /// Correlation key of the request
        key: String,
    },
    /// The response feed has shut down
    #[error("response feed has shut down")]
    CollectorClosed,
}

impl HandlerError {
    /// HTTP status code reported to the client
    pub fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::DeliveryFailed { .. }
            | HandlerError::RequestLost { .. }
            | HandlerError::CollectorClosed => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Body reported to the client
    pub fn response(&self) -> ErrorResponse {
        let code = self.status_code();

        ErrorResponse::new(
            code.as_u16(),
            code.canonical_reason().unwrap_or_default(),
            self.to_string(),
        )
    }
}

impl From<CollectorError> for HandlerError {
    fn from(error: CollectorError) -> Self {
        match error {
            CollectorError::Completed => HandlerError::CollectorClosed,
        }
    }
}

/// Front door turning a [`WatchRequest`] into a [`WatchResponse`]
///
/// Publishes the request for the workers and collects the facets they return from the
/// [`ReplayCollector`] fed by the response topic.
pub struct WatchRequestHandler<P> {
    publisher: P,
    collector: ReplayCollector<WatchMessage>,
    request_topic: TopicDescriptor,
    expected: HashSet<FacetKind>,
    deadline: Duration,
    refresh_interval: u32,
    metrics: Arc<RequestMetrics>,
}

impl<P> WatchRequestHandler<P>
where
    P: MessagePublisher + Send + Sync,
{
    /// Creates a handler expecting the given facets for each request
    pub fn new(
        publisher: P,
        collector: ReplayCollector<WatchMessage>,
        request_topic: TopicDescriptor,
        expected: impl IntoIterator<Item = FacetKind>,
        deadline: Duration,
    ) -> Self {
        Self {
            publisher,
            collector,
            request_topic,
            expected: expected.into_iter().collect(),
            deadline,
            refresh_interval: domain::DEFAULT_REFRESH_INTERVAL,
            metrics: Arc::new(RequestMetrics::default()),
        }
    }

    /// Overrides the refresh interval reported to the watch
    pub fn with_refresh_interval(mut self, minutes: u32) -> Self {
        self.refresh_interval = minutes;
        self
    }

    /// Counters of this handler
    pub fn metrics(&self) -> Arc<RequestMetrics> {
        self.metrics.clone()
    }

    /// Distributes the request to the workers and assembles their results
    #[instrument(skip(self, request), fields(key = field::Empty, trace_id = field::Empty))]
    pub async fn handle(&self, mut request: WatchRequest) -> Result<WatchResponse, HandlerError> {
        let _active = self.metrics.track();

        // Keys are unique per request and never taken from the client
        request.request_id = Uuid::new_v4().to_string();

        let key = request.request_id.clone();
        let trace_id = Uuid::new_v4().to_string();
        Span::current()
            .record("key", &key.as_str())
            .record("trace_id", &trace_id.as_str());

        let message = KnownMessage::new(key.clone(), WatchMessage::from(request))
            .with_trace_id(Some(trace_id));

        let report = self
            .publisher
            .publish(&self.request_topic, &message)
            .await
            .map_err(|e| HandlerError::DeliveryFailed {
                key: key.clone(),
                reason: e.to_string(),
            })?;

        if !report.is_persisted() {
            warn!("Request has not been persisted by the broker");
            return Err(HandlerError::DeliveryFailed {
                key,
                reason: "broker did not persist the request".into(),
            });
        }

        self.metrics.produced();
        debug!("Published request");

        let collection = self
            .collector
            .collect(&key, &self.expected, self.deadline)
            .await?;

        if collection.is_empty() || collection.received_key() != Some(key.as_str()) {
            self.metrics.lost();
            warn!(elapsed = ?collection.elapsed(), "Request lost");
            return Err(HandlerError::RequestLost { key });
        }

        self.metrics.collected();
        info!(
            elapsed = ?collection.elapsed(),
            missing = ?collection.missing(),
            "Request collected"
        );

        Ok(self.assemble(key, collection))
    }

    fn assemble(&self, key: String, mut collection: Collection<WatchMessage>) -> WatchResponse {
        let mut response = WatchResponse::new(key);
        response.refresh_interval = self.refresh_interval;

        for kind in self.expected.iter() {
            let facet = collection.take(kind).map(|message| message.value);

            match (kind, facet) {
                (FacetKind::Location, Some(WatchMessage::LocationInfo(info))) => {
                    response.location = info
                }
                (FacetKind::Weather, Some(WatchMessage::WeatherInfo(info))) => {
                    response.weather = info
                }
                (FacetKind::ExchangeRate, Some(WatchMessage::ExchangeRateInfo(info))) => {
                    response.exchange = info
                }
                (FacetKind::Location, _) => {
                    response.location = LocationInfo::failed(not_received(kind))
                }
                (FacetKind::Weather, _) => response.weather = WeatherInfo::failed(not_received(kind)),
                (FacetKind::ExchangeRate, _) => {
                    response.exchange = ExchangeRateInfo::failed(not_received(kind))
                }
            }
        }

        response
    }
}

fn not_received(kind: &FacetKind) -> RequestStatus {
    RequestStatus::error(format!("{} has not been received in time", kind))
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::api::services::CollectorFeed;
    use async_trait::async_trait;
    use domain::RequestStatusCode as FacetStatus;
    use library::communication::event::{
        Consumer, ConsumerExt, ConsumerGroupDescriptor, TopicLocation,
    };
    use library::communication::implementation::memory::{MemoryBroker, PublishBehaviour};
    use library::EmptyResult;
    use pretty_assertions::assert_eq;

    fn requests() -> TopicDescriptor {
        TopicDescriptor::new("requests", 100)
    }

    fn responses() -> TopicDescriptor {
        TopicDescriptor::new("responses", 100)
    }

    /// Answers every request with fixed facets, leaving out the weather if asked to
    struct StubWorker {
        broker: MemoryBroker,
        skip_weather: bool,
    }

    #[async_trait]
    impl Consumer for StubWorker {
        type Message = WatchMessage;

        async fn consume(&self, message: KnownMessage<WatchMessage>) -> EmptyResult {
            let key = message.key.clone();
            let mut facets: Vec<WatchMessage> = vec![
                LocationInfo::ok("Olathe, United States").into(),
                ExchangeRateInfo::ok(51.440375, "CurrencyConverter").into(),
            ];

            if !self.skip_weather {
                let mut weather = WeatherInfo::default();
                weather.weather_provider = Some("OpenWeather".into());
                weather.icon = Some("clear-day".into());
                weather.temperature = 4.28;
                weather.status = RequestStatus::ok();
                facets.push(weather.into());
            }

            for facet in facets {
                let reply = message.reply(facet.with_request_id(&key));
                self.broker.publish(&responses(), &reply).await?;
            }

            Ok(())
        }
    }

    async fn cluster(skip_weather: bool) -> (MemoryBroker, ReplayCollector<WatchMessage>) {
        let broker = MemoryBroker::new();
        let collector = ReplayCollector::new(Duration::from_secs(60));

        let feed = CollectorFeed::new(collector.clone());
        let provider = broker.clone();
        tokio::spawn(async move {
            let group = ConsumerGroupDescriptor::new("api-test", TopicLocation::Head);
            feed.consume_topic(&provider, &responses(), &group, "api", |_| {})
                .await
        });

        let worker = StubWorker {
            broker: broker.clone(),
            skip_weather,
        };
        let provider = broker.clone();
        tokio::spawn(async move {
            let group = ConsumerGroupDescriptor::new("worker", TopicLocation::Head);
            worker
                .consume_topic(&provider, &requests(), &group, "w1", |_| {})
                .await
        });

        (broker, collector)
    }

    fn olathe(request_id: &str) -> WatchRequest {
        WatchRequest {
            request_id: request_id.into(),
            lat: Some(38.855652),
            lon: Some(-94.799712),
            device_id: Some("r1-device".into()),
            base_currency: Some("EUR".into()),
            target_currency: Some("PHP".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn assemble_all_facets() {
        let (broker, collector) = cluster(false).await;
        let handler = WatchRequestHandler::new(
            broker.clone(),
            collector,
            requests(),
            FacetKind::all(),
            Duration::from_secs(5),
        );

        let response = handler.handle(olathe("")).await.unwrap();

        assert_eq!(response.location.city_name.as_deref(), Some("Olathe, United States"));
        assert_eq!(response.location.request_id, response.request_id);
        assert_eq!(response.weather.icon.as_deref(), Some("clear-day"));
        assert_eq!(response.exchange.exchange_rate, 51.440375);
        assert_eq!(response.refresh_interval, 40);

        let published = broker.messages(&requests());
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key, response.request_id);
        assert!(published[0].header.trace_id.is_some());

        let metrics = handler.metrics().snapshot();
        assert_eq!((metrics.produced, metrics.collected, metrics.lost), (1, 1, 0));
        assert_eq!(metrics.active, 0);
    }

    #[tokio::test]
    async fn replace_keys_chosen_by_clients() {
        let (broker, collector) = cluster(false).await;
        let handler = WatchRequestHandler::new(
            broker,
            collector,
            requests(),
            FacetKind::all(),
            Duration::from_secs(5),
        );

        let first = handler.handle(olathe("r1")).await.unwrap();
        let second = handler.handle(olathe("r1")).await.unwrap();

        assert!(Uuid::parse_str(&first.request_id).is_ok());
        assert_ne!(first.request_id, "r1");
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(second.location.request_id, second.request_id);
    }

    #[tokio::test]
    async fn never_answer_with_facets_of_other_requests() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector
            .publish(KnownMessage::new(
                "dup",
                WatchMessage::from(LocationInfo::ok("Stale City").with_request_id("dup")),
            ))
            .await;

        let handler = WatchRequestHandler::new(
            MemoryBroker::new(),
            collector,
            requests(),
            FacetKind::all(),
            Duration::from_millis(100),
        );

        let error = handler.handle(olathe("dup")).await.unwrap_err();

        assert!(matches!(error, HandlerError::RequestLost { ref key } if key != "dup"));
    }

    #[tokio::test]
    async fn mark_late_facets_as_failed() {
        let (broker, collector) = cluster(true).await;
        let handler = WatchRequestHandler::new(
            broker,
            collector,
            requests(),
            FacetKind::all(),
            Duration::from_millis(200),
        )
        .with_refresh_interval(15);

        let response = handler.handle(olathe("r3")).await.unwrap();

        assert_eq!(response.location.status.status_code, FacetStatus::Ok);
        assert_eq!(response.weather.status.status_code, FacetStatus::Error);
        assert_eq!(response.refresh_interval, 15);
    }

    #[tokio::test]
    async fn ignore_facets_that_are_not_expected() {
        let (broker, collector) = cluster(true).await;
        let handler = WatchRequestHandler::new(
            broker,
            collector,
            requests(),
            [FacetKind::Location],
            Duration::from_secs(5),
        );

        let response = handler.handle(olathe("r4")).await.unwrap();

        assert_eq!(response.location.status.status_code, FacetStatus::Ok);
        assert_eq!(response.weather.status.status_code, FacetStatus::HasNotBeenRequested);
        assert_eq!(response.exchange.status.status_code, FacetStatus::HasNotBeenRequested);
    }

    #[tokio::test]
    async fn report_lost_requests() {
        let broker = MemoryBroker::new();
        let handler = WatchRequestHandler::new(
            broker,
            ReplayCollector::new(Duration::from_secs(60)),
            requests(),
            FacetKind::all(),
            Duration::from_millis(100),
        );

        let error = handler.handle(olathe("r2")).await.unwrap_err();

        assert!(matches!(error, HandlerError::RequestLost { .. }));
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(error.response().status_code, 503);
        assert_eq!(handler.metrics().snapshot().lost, 1);
    }

    #[tokio::test]
    async fn reject_requests_not_persisted() {
        let broker = MemoryBroker::new();
        broker.set_publish_behaviour(PublishBehaviour::Drop);
        let handler = WatchRequestHandler::new(
            broker.clone(),
            ReplayCollector::new(Duration::from_secs(60)),
            requests(),
            FacetKind::all(),
            Duration::from_secs(5),
        );

        let error = handler.handle(olathe("r5")).await.unwrap_err();
        assert!(matches!(error, HandlerError::DeliveryFailed { .. }));

        broker.set_publish_behaviour(PublishBehaviour::Fail);
        let error = handler.handle(olathe("r6")).await.unwrap_err();
        assert!(matches!(error, HandlerError::DeliveryFailed { .. }));

        assert_eq!(handler.metrics().snapshot().produced, 0);
    }

    #[tokio::test]
    async fn fail_fast_once_the_feed_stopped() {
        let collector = ReplayCollector::new(Duration::from_secs(60));
        collector.complete().await;

        let handler = WatchRequestHandler::new(
            MemoryBroker::new(),
            collector,
            requests(),
            FacetKind::all(),
            Duration::from_secs(5),
        );

        let error = handler.handle(olathe("r7")).await.unwrap_err();
        assert!(matches!(error, HandlerError::CollectorClosed));
    }
}

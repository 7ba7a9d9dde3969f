use crate::worker::resolvers::BoxedFacetResolver;
use async_trait::async_trait;
use domain::WatchMessage;
use harness::Service;
use library::communication::event::{
    Consumer, KnownMessage, MessageCodec, MessagePublisher, TopicDescriptor,
};
use library::communication::CommunicationFactory;
use library::EmptyResult;
use tracing::{debug, instrument, warn};

/// Configuration shared by all instances of the [`RequestProcessor`]
pub struct ProcessorConfig {
    /// Resolver for the facet handled by this worker
    pub resolver: BoxedFacetResolver,
    /// Topic on which resolved facets are published
    pub response_topic: TopicDescriptor,
}

/// Resolves one facet for each consumed request and publishes it as a reply
pub struct RequestProcessor<P> {
    resolver: BoxedFacetResolver,
    publisher: P,
    response_topic: TopicDescriptor,
}

/// [`Service`] instantiating a [`RequestProcessor`] per consume loop
pub struct ProcessorService;

impl<F> Service<F> for ProcessorService
where
    F: CommunicationFactory + Send + Sync,
{
    const NAME: &'static str = "RequestProcessor";

    type Instance = RequestProcessor<F::MessagePublisher>;
    type Config = ProcessorConfig;

    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance {
        RequestProcessor {
            resolver: config.resolver.clone(),
            publisher: factory.message_publisher(),
            response_topic: config.response_topic.clone(),
        }
    }
}

#[async_trait]
impl<P> Consumer for RequestProcessor<P>
where
    P: MessagePublisher + Send + Sync,
{
    type Message = WatchMessage;

    #[instrument(skip(self, message), fields(key = %message.key, facet = %self.resolver.kind()))]
    async fn consume(&self, message: KnownMessage<WatchMessage>) -> EmptyResult {
        let request = match &message.value {
            WatchMessage::WatchRequest(request) => request,
            other => {
                warn!(message_type = other.message_type(), "Ignoring message that is not a request");
                return Ok(());
            }
        };

        let facet = self.resolver.resolve(request).await;
        let reply = message.reply(facet.with_request_id(&message.key));

        let report = self.publisher.publish(&self.response_topic, &reply).await?;
        if !report.is_persisted() {
            return Err(format!("facet for {} has not been persisted", message.key).into());
        }

        debug!("Published facet");
        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::worker::resolvers::FacetResolver;
    use domain::{FacetKind, LocationInfo, WatchRequest};
    use library::communication::event::{
        ConsumerExt, ConsumerGroupDescriptor, TopicLocation,
    };
    use library::communication::implementation::memory::MemoryBroker;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    struct FixedLocation;

    #[async_trait]
    impl FacetResolver for FixedLocation {
        fn kind(&self) -> FacetKind {
            FacetKind::Location
        }

        async fn resolve(&self, _request: &WatchRequest) -> WatchMessage {
            LocationInfo::ok("Olathe, United States").into()
        }
    }

    fn requests() -> TopicDescriptor {
        TopicDescriptor::new("requests", 100)
    }

    fn responses() -> TopicDescriptor {
        TopicDescriptor::new("responses", 100)
    }

    async fn responses_of(broker: &MemoryBroker, count: usize) -> Vec<KnownMessage<WatchMessage>> {
        timeout(Duration::from_secs(2), async {
            loop {
                let messages = broker.messages(&responses());
                if messages.len() >= count {
                    return messages
                        .iter()
                        .map(|raw| KnownMessage::decode(raw).unwrap())
                        .collect();
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn reply_with_key_and_trace() {
        let broker = MemoryBroker::new();
        let config = ProcessorConfig {
            resolver: Arc::new(FixedLocation),
            response_topic: responses(),
        };
        let processor = ProcessorService::instantiate(broker.clone(), &config);

        let request = KnownMessage::new("r1", WatchMessage::from(WatchRequest::default()))
            .with_trace_id(Some("t1".into()));
        broker.publish(&requests(), &request).await.unwrap();

        let provider = broker.clone();
        tokio::spawn(async move {
            let group = ConsumerGroupDescriptor::new("worker-location", TopicLocation::Head);
            processor
                .consume_topic(&provider, &requests(), &group, "w1", |_| {})
                .await
        });

        let replies = responses_of(&broker, 1).await;
        assert_eq!(replies[0].key, "r1");
        assert_eq!(replies[0].trace_id.as_deref(), Some("t1"));

        match &replies[0].value {
            WatchMessage::LocationInfo(info) => {
                assert_eq!(info.request_id, "r1");
                assert_eq!(info.city_name.as_deref(), Some("Olathe, United States"));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn drop_foreign_messages() {
        let broker = MemoryBroker::new();
        let config = ProcessorConfig {
            resolver: Arc::new(FixedLocation),
            response_topic: responses(),
        };
        let processor = ProcessorService::instantiate(broker.clone(), &config);

        broker
            .publish(&requests(), &KnownMessage::new("x", WatchMessage::from(LocationInfo::default())))
            .await
            .unwrap();
        broker
            .publish(&requests(), &KnownMessage::new("r2", WatchMessage::from(WatchRequest::default())))
            .await
            .unwrap();

        let provider = broker.clone();
        tokio::spawn(async move {
            let group = ConsumerGroupDescriptor::new("worker-location", TopicLocation::Head);
            processor
                .consume_topic(&provider, &requests(), &group, "w1", |_| {})
                .await
        });

        let replies = responses_of(&broker, 1).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].key, "r2");
        assert_eq!(broker.acknowledged(), 2);
    }
}

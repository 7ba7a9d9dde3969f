use super::event::{MessagePublisher, TopicProvider};

/// Factory to provide implementations for the traits of the [`event`](super::event) module
pub trait CommunicationFactory {
    /// [`TopicProvider`] implementation type
    type TopicProvider: TopicProvider + Send + Sync;
    /// [`MessagePublisher`] implementation type
    type MessagePublisher: MessagePublisher + Send + Sync;

    /// Instantiates a new [`TopicProvider`]
    fn topic_provider(&self) -> Self::TopicProvider;
    /// Instantiates a new [`MessagePublisher`]
    fn message_publisher(&self) -> Self::MessagePublisher;
}

//! Default topics shared by the api and the workers

use library::communication::event::TopicDescriptor;

/// Topic carrying [`WatchRequest`](crate::WatchRequest)s to the workers
pub const REQUEST_TOPIC: &str = "watch-request";

/// Topic carrying resolved facets back to the api
pub const RESPONSE_TOPIC: &str = "watch-response";

/// Approximate number of entries retained per topic
pub const TOPIC_LIMIT: usize = 10_000;

pub fn request_topic() -> TopicDescriptor {
    TopicDescriptor::new(REQUEST_TOPIC, TOPIC_LIMIT)
}

pub fn response_topic() -> TopicDescriptor {
    TopicDescriptor::new(RESPONSE_TOPIC, TOPIC_LIMIT)
}

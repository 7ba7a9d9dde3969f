//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use library::communication::event::TopicDescriptor;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        global = true,
        default_value = "redis://watchcluster-redis/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options relevant for message queueing
#[derive(Debug, StructOpt)]
pub struct QueueingOptions {
    /// Unique and stable identifier for this instance.
    /// It is used to identify and resume work after a crash
    /// or deliberate restart, thus it may not change across
    /// executions!
    #[structopt(long, env)]
    pub id: String,
}

/// Names and limits of the topics connecting the api and the workers
#[derive(Debug, StructOpt)]
pub struct TopicOptions {
    /// Topic on which watch requests are published
    #[structopt(long, env, default_value = "watch-request")]
    pub request_topic: String,

    /// Topic on which resolved facets are published
    #[structopt(long, env, default_value = "watch-response")]
    pub response_topic: String,

    /// Approximate number of entries retained per topic
    #[structopt(long, env, default_value = "10000")]
    pub topic_limit: usize,
}

impl TopicOptions {
    /// Descriptor of the request topic
    pub fn requests(&self) -> TopicDescriptor {
        TopicDescriptor::new(&self.request_topic, self.topic_limit)
    }

    /// Descriptor of the response topic
    pub fn responses(&self) -> TopicDescriptor {
        TopicDescriptor::new(&self.response_topic, self.topic_limit)
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use domain::topics;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_to_shared_topics() {
        let options = TopicOptions::from_iter_safe(&["topics"]).unwrap();

        for (configured, shared) in [
            (options.requests(), topics::request_topic()),
            (options.responses(), topics::response_topic()),
        ] {
            assert_eq!(configured.key(), shared.key());
            assert_eq!(configured.limit(), shared.limit());
        }
    }
}

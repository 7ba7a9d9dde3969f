use crate::options::{QueueingOptions, RedisOptions, TopicOptions};
use domain::FacetKind;
use library::helpers::parse_seconds;
use std::time::Duration;
use structopt::StructOpt;

/// Options for the api module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Port on which watch requests are accepted
    #[structopt(short, long, env, default_value = "8080")]
    pub port: u16,

    /// Seconds to wait for the facets of a request
    #[structopt(long, env, default_value = "15", parse(try_from_str = parse_seconds))]
    pub deadline: Duration,

    /// Seconds for which received facets are retained for late collections
    #[structopt(long, env, default_value = "60", parse(try_from_str = parse_seconds))]
    pub retention: Duration,

    /// Facets a response is made of
    #[structopt(
        long,
        env,
        use_delimiter = true,
        default_value = "location,weather,exchange-rate"
    )]
    pub expected_facets: Vec<FacetKind>,

    /// Refresh interval in minutes suggested to the watch
    #[structopt(long, env, default_value = "40")]
    pub refresh_interval: u32,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub topics: TopicOptions,
}

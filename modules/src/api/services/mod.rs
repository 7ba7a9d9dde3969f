mod feed;

pub use feed::{CollectorFeed, CollectorFeedJob, CollectorFeedService};

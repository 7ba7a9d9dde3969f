//! Trait implementations using [Redis Streams](https://redis.io/topics/streams-intro)
//!
//! Each message is stored as one stream entry with the fields `key`, `type`, `traceId` (optional)
//! and `payload`. Consumer groups map directly onto Redis consumer groups.

const FIELD_KEY: &str = "key";
const FIELD_TYPE: &str = "type";
const FIELD_TRACE_ID: &str = "traceId";
const FIELD_PAYLOAD: &str = "payload";

const STREAM_ID_NEW: &str = "*";
const STREAM_ID_HEAD: &str = "0";
const STREAM_ID_TAIL: &str = "$";
const STREAM_ID_ADDITIONS: &str = ">";

mod factory;
mod publisher;
mod topic_entry;
mod topic_provider;

pub use factory::*;
pub use publisher::*;
pub use topic_entry::*;
pub use topic_provider::*;

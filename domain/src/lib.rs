//! Watch face data model
//!
//! Contains the request sent by a watch, the facets resolved by the workers, the aggregated
//! response and the message union exchanged over the broker.

mod facets;
mod message;
mod request;
mod response;
mod status;

pub mod topics;

pub use facets::*;
pub use message::*;
pub use request::*;
pub use response::*;
pub use status::*;

/// Version reported to clients in every response body
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

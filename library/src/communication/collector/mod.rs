//! Fan-in of correlated messages
//!
//! Results for a request arrive on a shared topic in arbitrary order and possibly before anybody
//! asked for them. The [`ReplayCollector`] retains every received message for a configurable window
//! in an append-only log indexed by correlation key. A [`collect`](ReplayCollector::collect) call
//! reads the retained messages of its key and then waits for new ones until it has seen one message
//! of each expected kind or the deadline passes.
//!
//! There is a single writer feeding the log and any number of concurrent readers.

mod collection;
mod replay;

pub use collection::{Collection, CollectionOutcome};
pub use replay::ReplayCollector;

use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// Payloads that can be sorted into kinds for collection
pub trait Classify {
    /// Discriminator of the payload, e.g. which part of a response it contains
    type Kind: Eq + Hash + Clone + Debug + Send + Sync + 'static;

    /// Kind of this payload or `None` if it is never collected
    fn kind(&self) -> Option<Self::Kind>;
}

/// Errors returned by the [`ReplayCollector`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectorError {
    /// The feeding stream has ended, new collections can not succeed
    #[error("collector has completed and accepts no new collections")]
    Completed,
}

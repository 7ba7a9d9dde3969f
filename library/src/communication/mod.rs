//! Structures to communicate between services through a message broker
//!
//! Services exchange [`KnownMessage`](event::KnownMessage)s over named topics. Every message carries a
//! correlation key, a header naming the payload type and an optional trace id. Publishing and consuming
//! is expressed by the traits in [`event`] while [`implementation`] contains the concrete transports.
//!
//! The [`collector`] module provides the fan-in side: a retention bounded replay log which allows
//! waiting for all messages sharing a correlation key.

mod communication_factory;

pub mod collector;
pub mod event;
pub mod implementation;

pub use communication_factory::CommunicationFactory;

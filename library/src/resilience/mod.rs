//! Resilient access to unreliable remote providers
//!
//! A [`ResilientChain`] combines a primary [`Provider`], an optional fallback, a [`CircuitBreaker`]
//! guarding the primary and an optional [`ExpiringCache`]. Resolving never fails: every failure is
//! folded into the provider's own [`Outcome`] type carrying an error status.

mod cache;
mod chain;
mod circuit;

pub use cache::ExpiringCache;
pub use chain::{Cacheable, Outcome, Provider, Resolved, ResilientChain, ResolvedSource};
pub use circuit::{BreakerConfig, CircuitBreaker, CircuitState, Permit};

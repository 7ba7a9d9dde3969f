//! Transports and serialization backing the [`event`](super::event) traits

pub mod json;
#[cfg(any(test, feature = "test"))]
pub mod memory;
pub mod redis;

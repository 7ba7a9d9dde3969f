//! Independent and project agnostic libraries
//!
//! Any of the submodules in this crate could be extracted into a crate of its own. They have been
//! developed with the watch cluster in mind, but everything domain specific lives in the `domain` crate.

#![deny(missing_docs)]

pub mod communication;
pub mod helpers;
pub mod resilience;
pub mod scheduling;

/// Generic error type
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result with no value and a [`BoxedError`]
pub type EmptyResult = Result<(), BoxedError>;

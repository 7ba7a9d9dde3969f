//! Runnable modules each bundling multiple jobs and providing a unified configuration

#![deny(missing_docs)]

pub mod options;

pub mod api;
pub mod worker;

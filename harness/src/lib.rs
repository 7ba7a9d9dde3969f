//! Runtime harness to execute modules and their jobs

#![deny(missing_docs)]

mod heart;
mod module;
mod redis;
mod service;

pub use self::redis::*;
pub use heart::*;
pub use module::*;
pub use service::*;

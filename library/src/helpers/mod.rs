//! Small utilities shared by all components

mod backoff;
mod template;

pub use backoff::Backoff;
pub use template::fill_template;

use std::num::ParseIntError;
use std::time::Duration;

/// Parses a string containing a number of seconds into a [`Duration`]
///
/// Meant to be used with `structopt`'s `parse(try_from_str = ...)` attribute.
pub fn parse_seconds(src: &str) -> Result<Duration, ParseIntError> {
    src.parse().map(Duration::from_secs)
}

/// Parses a string containing a number of milliseconds into a [`Duration`]
pub fn parse_millis(src: &str) -> Result<Duration, ParseIntError> {
    src.parse().map(Duration::from_millis)
}

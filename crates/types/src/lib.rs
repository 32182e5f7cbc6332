//! Shared primitives for the health bridge.
//!
//! Everything that crosses the host boundary is text. This crate holds the small validated
//! building blocks every other crate agrees on:
//! - [`NonEmptyText`] for names and identifiers that must carry content
//! - the fixed wire timestamp format, see [`format_timestamp`] and [`parse_timestamp`]

mod text;
mod timestamp;

pub use text::NonEmptyText;
pub use timestamp::{format_timestamp, parse_timestamp, TIMESTAMP_FORMAT};

/// Errors raised while constructing validated primitives.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TypesError {
    /// The input text was empty or whitespace only.
    #[error("text cannot be empty")]
    Empty,

    /// The input was not a timestamp in the fixed wire format.
    #[error("invalid timestamp '{0}' (expected YYYY-MM-DDTHH:MM:SS.mmmZ)")]
    InvalidTimestamp(String),
}

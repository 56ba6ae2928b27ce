//! Channel content digest pipeline.
//!
//! Fetches recent messages from configured channels, reconstructs posts
//! that were published as separate text and media messages, optionally
//! selects top posts by engagement quotas, brands attached media with a
//! logo overlay, and appends the results to a durable sink.

pub mod brand;
pub mod config;
pub mod cursor;
pub mod error;
pub mod pipeline;
pub mod source;
pub mod store;

pub use error::{Error, Result};

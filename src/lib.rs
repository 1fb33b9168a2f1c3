//! Merge several RSS/Atom feeds into one and serve it over HTTP.
//!
//! - [`feed`] - data model, codec, retrieval and error classification
//! - [`pipeline`] - concurrent fetch handles, merging, filter and limit
//! - [`server`] - HTTP serving with graceful degradation on permanent errors
//! - [`pipe`] - config-driven pipes tying the above together
//! - [`config`] - TOML configuration

pub mod config;
pub mod feed;
pub mod pipe;
pub mod pipeline;
pub mod server;
